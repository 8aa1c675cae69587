//! One-shot events parked on a futex-backed atomic.
//!
//! Native targets rely on the `atomic-wait` crate, which maps onto futexes
//! (or the platform equivalent) so waiters sleep instead of spinning.

use std::sync::atomic::{AtomicU32, Ordering};

const UNSET: u32 = 0;
const SET: u32 = 1;

/// Event that fires once and then stays set.
///
/// Later calls to [`OneShotEvent::set`] are no-ops; waiters that arrive after
/// the event fired return immediately.
#[derive(Debug, Default)]
pub struct OneShotEvent {
    state: AtomicU32,
}

impl OneShotEvent {
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(UNSET),
        }
    }

    /// Fires the event. Returns true only for the call that fired it.
    pub fn set(&self) -> bool {
        let fired = self
            .state
            .compare_exchange(UNSET, SET, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if fired {
            atomic_wait::wake_all(&self.state as *const AtomicU32);
        }
        fired
    }

    pub fn is_set(&self) -> bool {
        self.state.load(Ordering::Acquire) == SET
    }

    /// Blocks the caller until the event fires.
    pub fn wait(&self) {
        // Wakeups can be spurious; re-check the state each time.
        while self.state.load(Ordering::Acquire) == UNSET {
            atomic_wait::wait(&self.state, UNSET);
        }
    }
}
