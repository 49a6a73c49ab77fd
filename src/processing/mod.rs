//! Processors that sit between the dataflow graph and the services: they consume a
//! source's mono block plus transforms and produce the listener-facing output for one
//! audio tick (§4.6-§4.8).

pub mod distance_attenuation;
pub mod directivity_convolver;
pub mod hrtf_convolver;
pub mod near_field_filter;

pub use directivity_convolver::DirectivityConvolverProcessor;
pub use distance_attenuation::DistanceAttenuationProcessor;
pub use hrtf_convolver::{HrtfConvolverProcessor, ListenerService};
pub use near_field_filter::NearFieldFilterProcessor;
