//! Ownerless binary lock.
//!
//! A `WriterGate` behaves like a binary semaphore: `acquire` blocks until the
//! gate is free and marks it held, `release` frees it and wakes one waiter.
//! Unlike `std::sync::Mutex` there is no guard tied to the acquiring thread,
//! so the first reader of a group can take the gate and the last reader,
//! running on any thread, can give it back.
//!
//! # Examples
//!
//! ```
//! use foundation_rwsync::WriterGate;
//!
//! let gate = WriterGate::new();
//! gate.acquire();
//! assert!(gate.is_held());
//! assert!(!gate.try_acquire());
//! gate.release();
//! assert!(!gate.is_held());
//! ```

use std::sync::{Condvar, Mutex, MutexGuard};

/// `GateState` is the single piece of state behind the gate's mutex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    /// Nobody holds the gate.
    Free,
    /// A writer, or the reader group, holds the gate.
    Held,
}

/// A binary lock whose release is not bound to the acquiring thread.
///
/// Callers are responsible for pairing every successful `acquire` or
/// `try_acquire` with exactly one `release`. `SharedCounter` does that
/// through its RAII guards.
#[derive(Debug)]
pub struct WriterGate {
    state: Mutex<GateState>,
    released: Condvar,
}

impl Default for WriterGate {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterGate {
    /// Creates a free gate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Free),
            released: Condvar::new(),
        }
    }

    // The state is a plain enum that is always written in one step, so a
    // panic elsewhere while the mutex was held cannot leave it torn.
    fn lock_state(&self) -> MutexGuard<'_, GateState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Blocks the current thread until the gate is free, then holds it.
    pub fn acquire(&self) {
        let mut state = self.lock_state();
        while *state == GateState::Held {
            state = match self.released.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        *state = GateState::Held;
    }

    /// Holds the gate if it is free, without blocking.
    ///
    /// Returns `true` when the caller now holds the gate.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock_state();
        if *state == GateState::Held {
            return false;
        }
        *state = GateState::Held;
        true
    }

    /// Frees the gate and wakes one blocked `acquire`.
    ///
    /// Releasing a gate that is already free is a pairing bug in the caller;
    /// it is logged and trips a debug assertion, and the gate stays free.
    pub fn release(&self) {
        let mut state = self.lock_state();
        let was_held = *state == GateState::Held;
        debug_assert!(was_held, "WriterGate released while already free");
        if !was_held {
            tracing::error!("WriterGate released while already free");
            return;
        }
        *state = GateState::Free;
        drop(state);

        self.released.notify_one();
    }

    /// Returns the current state of the gate.
    pub fn probe(&self) -> GateState {
        *self.lock_state()
    }

    /// Returns true if some holder currently owns the gate.
    pub fn is_held(&self) -> bool {
        self.probe() == GateState::Held
    }
}
