//! Fixed DSP primitives shared by the services and processors: mono buffer helpers,
//! biquad/SOS cascades, the expansion-method delay line, and the uniformly-partitioned
//! FFT convolver.

pub mod biquad;
pub mod buffer;
pub mod partitioned_convolver;

pub use biquad::SosCascade;
pub use buffer::{add_in_place, mute, silence, ExpansionDelayLine, MonoBuffer};
pub use partitioned_convolver::{partition_and_transform, PartitionedConvolver, SubFilter};
