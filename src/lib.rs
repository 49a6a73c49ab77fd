//! Real-time binaural spatial-audio rendering toolkit.
//!
//! # Overview
//!
//! This crate turns a set of sources and listeners, each carrying a position and
//! orientation, into a stereo mix rendered through measured head-related and
//! directivity transfer functions. It is organised the way the original
//! publish/subscribe dataflow design describes: sources and listeners own modules that
//! expose typed entry/exit ports, processors subscribe to the ports they need, and a
//! [`graph::Manager`] owns the whole thing and drives one tick at a time.
//!
//! # Modules
//!
//! - [`math`] — vectors, quaternions, transforms and the azimuth/elevation convention.
//! - [`error`] — the shared error type and warn-once logging helper.
//! - [`config`] — process-wide block size and sample rate.
//! - [`dsp`] — biquad cascades, buffer helpers, the expansion-method delay line and the
//!   uniformly-partitioned FFT convolver.
//! - [`services`] — the HRTF, near-field SOS filter and directivity-TF tables, each
//!   with an `Empty -> SetupInProgress -> Loaded` lifecycle.
//! - [`processing`] — the per-connection processors: HRTF convolution, distance
//!   attenuation, directivity filtering.
//! - [`model`] — the application-facing `Source` and `Listener` objects.
//! - [`graph`] — the dataflow primitives and the `Manager` that wires them together.
//! - [`io`] — file-format readers that feed the services' setup APIs.
//!
//! # Usage
//!
//! ```no_run
//! use brt_sound::config::GlobalParameters;
//! use brt_sound::graph::Manager;
//!
//! let params = GlobalParameters::new(512, 48_000);
//! let mut manager = Manager::new(params.block_size(), params.sample_rate());
//! manager.begin_setup();
//! manager.create_source("voice").unwrap();
//! manager.create_listener("player", 0.0875).unwrap();
//! manager.connect_source_to_listener("voice", "player").unwrap();
//! manager.end_setup();
//! ```

pub mod config;
pub mod dsp;
pub mod error;
pub mod graph;
pub mod io;
pub mod math;
pub mod model;
pub mod processing;
pub mod services;

pub use config::GlobalParameters;
pub use error::{BrtError, BrtResult};
pub use graph::Manager;
pub use model::{Listener, Source};
