use std::sync::atomic::{AtomicBool, Ordering};

/// Error kinds named by the original design: structural APIs return these, the audio
/// path never does (see [`warn_once`]).
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum BrtError {
    #[error("not set: {0}")]
    NotSet(String),

    #[error("not allowed: {0}")]
    NotAllowed(String),

    #[error("allocation failed: {0}")]
    BadAlloc(String),

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("bad size: {0}")]
    BadSize(String),

    #[error("physics: {0}")]
    Physics(String),

    #[error("null pointer: {0}")]
    NullPointer(String),

    #[error("warning: {0}")]
    Warning(String),
}

pub type BrtResult<T> = Result<T, BrtError>;

/// A single warn-once site. The audio path constructs one of these as a `static` and
/// calls [`WarnOnceSite::fire`] instead of logging on every tick, so a sustained-fault
/// condition (e.g. an expired service reference) does not flood the log.
pub struct WarnOnceSite {
    fired: AtomicBool,
}

impl WarnOnceSite {
    pub const fn new() -> Self {
        WarnOnceSite { fired: AtomicBool::new(false) }
    }

    pub fn fire(&self, message: &str) {
        if !self.fired.swap(true, Ordering::Relaxed) {
            log::warn!("{}", message);
        }
    }

    pub fn reset(&self) {
        self.fired.store(false, Ordering::Relaxed);
    }
}
