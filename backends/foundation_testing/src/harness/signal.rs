//! Cooperative stop token for worker threads.

use core::time::Duration;
use std::sync::{Condvar, Mutex, MutexGuard};

/// `StopSignal` lets workers sleep through their think time while staying
/// wakeable: a raised signal ends every pending wait at once.
#[derive(Debug, Default)]
pub struct StopSignal {
    raised: Mutex<bool>,
    event: Condvar,
}

impl StopSignal {
    /// Creates a lowered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        match self.raised.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Raises the signal and wakes every waiter.
    pub fn raise(&self) {
        let mut raised = self.lock();
        *raised = true;
        drop(raised);

        self.event.notify_all();
    }

    /// Lowers the signal so it can be reused for another run.
    pub fn reset(&self) {
        *self.lock() = false;
    }

    /// Returns true once [`StopSignal::raise`] was called and not reset.
    pub fn is_raised(&self) -> bool {
        *self.lock()
    }

    /// Blocks for up to `timeout` or until the signal is raised.
    ///
    /// Returns true if the signal is raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let raised = self.lock();
        if *raised || timeout.is_zero() {
            return *raised;
        }

        let (raised, _) = match self.event.wait_timeout_while(raised, timeout, |raised| !*raised) {
            Ok(result) => result,
            Err(poisoned) => poisoned.into_inner(),
        };
        *raised
    }
}
