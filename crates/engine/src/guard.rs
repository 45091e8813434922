//! Single-flight guard for analysis cycles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Allows at most one holder at a time, process-wide.
///
/// `try_acquire` is a single compare-exchange, so two callers can never both
/// observe "idle" and start.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    running: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard, or None if someone already holds it.
    pub fn try_acquire(&self) -> Option<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                running: Arc::clone(&self.running),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Proof of holding the guard. Releases it when dropped, including on
/// early return or panic.
#[derive(Debug)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
