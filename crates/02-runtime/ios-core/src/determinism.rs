use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag telling devices whether emulation must stay replayable.
///
/// While set, nothing may observe the host in a way that could diverge between
/// runs (no background hardware scanning, no live device lists).
#[derive(Clone, Debug, Default)]
pub struct Determinism {
    wants: Arc<AtomicBool>,
}

impl Determinism {
    pub fn new(wants_determinism: bool) -> Self {
        Self {
            wants: Arc::new(AtomicBool::new(wants_determinism)),
        }
    }

    pub fn wants_determinism(&self) -> bool {
        self.wants.load(Ordering::Acquire)
    }

    /// Updates the flag; returns the previous value.
    pub fn set(&self, wants_determinism: bool) -> bool {
        self.wants.swap(wants_determinism, Ordering::AcqRel)
    }
}
