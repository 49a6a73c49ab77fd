//! Shared services that store measured tables and serve runtime queries: the HRTF
//! service, the near-field SOS filter service and the directivity-TF service. All three
//! follow the same `Empty -> SetupInProgress -> Loaded` lifecycle and share the
//! quasi-uniform grid / slopes-method interpolator in [`grid`].

pub mod directivity;
pub mod grid;
pub mod hrtf;
pub mod sos;

pub use directivity::DirectivityService;
pub use hrtf::{ExtrapolationMethod, HrtfService};
pub use sos::SosFilterService;

/// Which ear a query or filter entry refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ear {
    Left,
    Right,
}

impl Ear {
    pub fn other(self) -> Ear {
        match self {
            Ear::Left => Ear::Right,
            Ear::Right => Ear::Left,
        }
    }
}

/// Lifecycle shared by every service (§4.2-§4.4): any public query outside `Loaded`
/// returns an empty/failure response rather than panicking.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ServiceState {
    Empty,
    SetupInProgress,
    Loaded,
}
