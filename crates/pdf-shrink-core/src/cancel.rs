//! One-shot cancellation signal with an interruptible timed wait.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
struct SignalState {
    cancelled: Mutex<bool>,
    ready: Condvar,
}

/// Cloneable handle; every clone observes the same signal.
#[derive(Clone, Default)]
pub struct CancelSignal {
    inner: Arc<SignalState>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal and wake every waiter. Raising twice is harmless.
    pub fn cancel(&self) {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.inner.ready.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep up to `timeout`, returning early once cancelled.
    /// Returns `true` if the signal was raised. A timeout too large to
    /// express as a deadline waits for the signal alone.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while !*cancelled {
            cancelled = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    self.inner
                        .ready
                        .wait_timeout(cancelled, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .inner
                    .ready
                    .wait(cancelled)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
        *cancelled
    }
}
