//! Reader-preferring shared counter.
//!
//! `SharedCounter` guards an `i64` with two distinct primitives:
//!
//! - a short-lived `Mutex` around the active reader count (the readers lock)
//! - a [`WriterGate`] giving exclusive access (the writer lock)
//!
//! Writers take the gate directly. The first reader of a group takes the gate
//! on behalf of every reader that follows, and the last reader to leave gives
//! it back. Readers arriving while the group is inside never touch the gate,
//! which is what makes the lock reader-preferring.
//!
//! # Examples
//!
//! ```
//! use foundation_rwsync::SharedCounter;
//!
//! let counter = SharedCounter::new(0);
//!
//! // Readers can overlap
//! {
//!     let r1 = counter.begin_read();
//!     let r2 = counter.begin_read();
//!     assert_eq!(r1.value(), 0);
//!     assert_eq!(r2.value(), 0);
//!     assert_eq!(counter.active_readers(), 2);
//! }
//!
//! // Writers are exclusive
//! {
//!     let mut w = counter.begin_write();
//!     assert_eq!(w.add(5), 5);
//! }
//!
//! assert_eq!(counter.read(), 5);
//! assert_eq!(counter.write(-2), 3);
//! ```
//!
//! # Unwinding
//!
//! Guards release their locks in `Drop`, so a panic inside a critical section
//! never leaves the gate held. There is no poisoning: the counter stays fully
//! usable after a panicking reader or writer.

use core::cell::UnsafeCell;
use core::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::primitives::WriterGate;

/// Point-in-time view of a counter's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterStats {
    /// Readers inside the read critical section right now.
    pub active_readers: usize,
    /// Highest number of simultaneous readers seen so far.
    pub max_concurrent_readers: usize,
    /// Read sessions that have ended.
    pub reads_completed: u64,
    /// Mutations applied by writers.
    pub writes_completed: u64,
    /// Whether the writer gate is held, by a writer or by the reader group.
    pub write_locked: bool,
}

/// An `i64` shared between concurrent readers and exclusive writers.
///
/// Share it between threads with `Arc<SharedCounter>`.
pub struct SharedCounter {
    value: UnsafeCell<i64>,
    /// The readers lock; the count it protects drives gate transitions.
    readers: Mutex<usize>,
    /// The writer lock.
    gate: WriterGate,
    // Mirrors of the reader count for callers polling without blocking.
    // Both are only written while `readers` is held.
    active_mirror: AtomicUsize,
    peak_readers: AtomicUsize,
    reads_completed: AtomicU64,
    writes_completed: AtomicU64,
}

// SAFETY: `value` is only read through a `ReadGuard`, which exists only while
// the reader group holds the gate, and only written through a `WriteGuard`,
// which exists only while a single writer holds the gate. The gate's mutex
// orders every write before any later read.
unsafe impl Sync for SharedCounter {}

impl SharedCounter {
    /// Creates a counter holding `initial` with no readers or writers.
    #[must_use]
    pub const fn new(initial: i64) -> Self {
        Self {
            value: UnsafeCell::new(initial),
            readers: Mutex::new(0),
            gate: WriterGate::new(),
            active_mirror: AtomicUsize::new(0),
            peak_readers: AtomicUsize::new(0),
            reads_completed: AtomicU64::new(0),
            writes_completed: AtomicU64::new(0),
        }
    }

    // The count is a single integer updated in place; a poisoned lock still
    // holds a valid value.
    fn lock_readers(&self) -> MutexGuard<'_, usize> {
        match self.readers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Enters the read critical section.
    ///
    /// The first reader of a group blocks until any writer inside has left,
    /// while holding the readers lock, so later readers queue behind it.
    /// Every other reader only waits for the readers lock.
    pub fn begin_read(&self) -> ReadGuard<'_> {
        let mut active = self.lock_readers();
        *active += 1;
        if *active == 1 {
            tracing::debug!("First reader entering, closing writer gate");
            self.gate.acquire();
        }
        self.active_mirror.store(*active, Ordering::Release);
        self.peak_readers.fetch_max(*active, Ordering::AcqRel);
        drop(active);

        ReadGuard { counter: self }
    }

    fn end_read(&self) {
        let mut active = self.lock_readers();
        debug_assert!(*active > 0, "read session ended with no active readers");
        *active = active.saturating_sub(1);
        self.active_mirror.store(*active, Ordering::Release);
        self.reads_completed.fetch_add(1, Ordering::Relaxed);
        if *active == 0 {
            tracing::debug!("Last reader leaving, opening writer gate");
            self.gate.release();
        }
    }

    /// Enters the write critical section, blocking until neither a writer nor
    /// the reader group holds the gate.
    pub fn begin_write(&self) -> WriteGuard<'_> {
        self.gate.acquire();
        WriteGuard { counter: self }
    }

    /// Enters the write critical section only if the gate is free right now.
    pub fn try_begin_write(&self) -> Option<WriteGuard<'_>> {
        if self.gate.try_acquire() {
            Some(WriteGuard { counter: self })
        } else {
            None
        }
    }

    fn end_write(&self) {
        self.gate.release();
    }

    /// Reads the current value inside its own read session.
    pub fn read(&self) -> i64 {
        self.begin_read().value()
    }

    /// Adds `delta` inside its own write session and returns the new value.
    ///
    /// Addition wraps on overflow.
    pub fn write(&self, delta: i64) -> i64 {
        self.begin_write().add(delta)
    }

    /// Replaces the value with `f(current)` inside its own write session and
    /// returns the new value.
    ///
    /// If `f` panics the gate is still released and the value is unchanged.
    pub fn write_with<F>(&self, f: F) -> i64
    where
        F: FnOnce(i64) -> i64,
    {
        self.begin_write().mutate(f)
    }

    /// Returns the value without opening a read session.
    ///
    /// Takes the writer gate for the duration of the copy, so reader
    /// statistics are left untouched. Blocks like a writer would.
    pub fn peek(&self) -> i64 {
        self.begin_write().value()
    }

    /// Returns the number of readers inside the read critical section.
    ///
    /// Does not block; the figure may be stale by the time it is used.
    pub fn active_readers(&self) -> usize {
        self.active_mirror.load(Ordering::Acquire)
    }

    /// Returns the historical maximum of simultaneous readers.
    pub fn max_concurrent_readers(&self) -> usize {
        self.peak_readers.load(Ordering::Acquire)
    }

    /// Returns true while a writer or the reader group holds the gate.
    pub fn is_write_locked(&self) -> bool {
        self.gate.is_held()
    }

    /// Collects the current bookkeeping without taking the readers lock.
    pub fn stats(&self) -> CounterStats {
        CounterStats {
            active_readers: self.active_readers(),
            max_concurrent_readers: self.max_concurrent_readers(),
            reads_completed: self.reads_completed.load(Ordering::Relaxed),
            writes_completed: self.writes_completed.load(Ordering::Relaxed),
            write_locked: self.is_write_locked(),
        }
    }

    /// Returns a mutable reference to the value.
    ///
    /// Exclusive access to the counter makes locking unnecessary.
    pub fn get_mut(&mut self) -> &mut i64 {
        self.value.get_mut()
    }

    /// Consumes the counter and returns the value.
    pub fn into_inner(self) -> i64 {
        self.value.into_inner()
    }
}

impl Default for SharedCounter {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for SharedCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("SharedCounter")
            .field("active_readers", &stats.active_readers)
            .field("max_concurrent_readers", &stats.max_concurrent_readers)
            .field("write_locked", &stats.write_locked)
            .finish_non_exhaustive()
    }
}

/// RAII read session for `SharedCounter`.
///
/// The session ends when the guard is dropped; the last reader out opens the
/// writer gate.
#[must_use = "the read session ends as soon as the guard is dropped"]
pub struct ReadGuard<'a> {
    counter: &'a SharedCounter,
}

impl ReadGuard<'_> {
    /// Returns the value as seen by this read session.
    #[inline]
    pub fn value(&self) -> i64 {
        // SAFETY: the reader group holds the gate for as long as this guard
        // lives, so no `WriteGuard` can exist.
        unsafe { *self.counter.value.get() }
    }

    /// Ends the read session.
    pub fn end(self) {
        drop(self);
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.counter.end_read();
    }
}

impl fmt::Debug for ReadGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadGuard")
            .field("value", &self.value())
            .finish()
    }
}

/// RAII write session for `SharedCounter`.
///
/// The writer gate is released when the guard is dropped.
#[must_use = "the write session ends as soon as the guard is dropped"]
pub struct WriteGuard<'a> {
    counter: &'a SharedCounter,
}

impl WriteGuard<'_> {
    /// Returns the value as seen by this write session.
    #[inline]
    pub fn value(&self) -> i64 {
        // SAFETY: this guard is the single holder of the gate.
        unsafe { *self.counter.value.get() }
    }

    /// Replaces the value with `f(current)` and returns the new value.
    pub fn mutate<F>(&mut self, f: F) -> i64
    where
        F: FnOnce(i64) -> i64,
    {
        let next = f(self.value());
        // SAFETY: this guard is the single holder of the gate, and no
        // reference into the cell outlives a `value()` call.
        unsafe {
            *self.counter.value.get() = next;
        }
        self.counter.writes_completed.fetch_add(1, Ordering::Relaxed);
        next
    }

    /// Adds `delta`, wrapping on overflow, and returns the new value.
    pub fn add(&mut self, delta: i64) -> i64 {
        self.mutate(|current| current.wrapping_add(delta))
    }

    /// Ends the write session.
    pub fn end(self) {
        drop(self);
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.counter.end_write();
    }
}

impl fmt::Debug for WriteGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteGuard")
            .field("value", &self.value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use tracing_test::traced_test;

    #[test]
    fn test_new() {
        let counter = SharedCounter::new(42);
        assert_eq!(counter.read(), 42);
        assert_eq!(counter.stats(), CounterStats {
            max_concurrent_readers: 1,
            reads_completed: 1,
            ..CounterStats::default()
        });
    }

    #[test]
    fn test_write_returns_new_value() {
        let counter = SharedCounter::new(0);
        assert_eq!(counter.write(1), 1);
        assert_eq!(counter.write(1), 2);
        assert_eq!(counter.write(-5), -3);
        assert_eq!(counter.read(), -3);
        assert_eq!(counter.stats().writes_completed, 3);
    }

    #[test]
    fn test_write_wraps_on_overflow() {
        let counter = SharedCounter::new(i64::MAX);
        assert_eq!(counter.write(1), i64::MIN);
    }

    #[test]
    fn test_write_with() {
        let counter = SharedCounter::new(3);
        assert_eq!(counter.write_with(|v| v * 7), 21);
        assert_eq!(counter.read(), 21);
    }

    #[test]
    fn test_readers_share_the_gate() {
        let counter = SharedCounter::new(0);

        let r1 = counter.begin_read();
        assert!(counter.is_write_locked());
        assert_eq!(counter.active_readers(), 1);

        let r2 = counter.begin_read();
        assert_eq!(counter.active_readers(), 2);
        assert!(counter.try_begin_write().is_none());

        r1.end();
        assert!(counter.is_write_locked(), "one reader is still inside");
        assert!(counter.try_begin_write().is_none());

        r2.end();
        assert!(!counter.is_write_locked());
        assert_eq!(counter.active_readers(), 0);
        assert_eq!(counter.max_concurrent_readers(), 2);
    }

    #[test]
    fn test_writer_excludes_others() {
        let counter = SharedCounter::new(0);

        let mut w = counter.begin_write();
        assert!(counter.is_write_locked());
        assert!(counter.try_begin_write().is_none());
        assert_eq!(w.add(10), 10);
        assert_eq!(w.value(), 10);
        w.end();

        assert!(!counter.is_write_locked());
        let mut w = counter.try_begin_write().expect("gate should be free");
        assert_eq!(w.mutate(|v| v - 1), 9);
    }

    #[test]
    fn test_panicking_writer_releases_gate() {
        let counter = SharedCounter::new(5);

        let result = catch_unwind(AssertUnwindSafe(|| {
            counter.write_with(|_| panic!("writer failed mid-section"))
        }));
        assert!(result.is_err());

        assert!(!counter.is_write_locked());
        assert_eq!(counter.read(), 5);
        assert_eq!(counter.write(1), 6);
    }

    #[test]
    fn test_panicking_reader_releases_gate() {
        let counter = SharedCounter::new(0);

        let result = catch_unwind(AssertUnwindSafe(|| {
            let guard = counter.begin_read();
            assert_eq!(guard.value(), 0);
            panic!("reader failed mid-section");
        }));
        assert!(result.is_err());

        assert_eq!(counter.active_readers(), 0);
        assert!(!counter.is_write_locked());
        assert_eq!(counter.write(2), 2);
    }

    #[test]
    fn test_peek_leaves_statistics_alone() {
        let counter = SharedCounter::new(8);
        assert_eq!(counter.peek(), 8);
        assert_eq!(counter.stats(), CounterStats::default());
    }

    #[test]
    fn test_get_mut_and_into_inner() {
        let mut counter = SharedCounter::new(1);
        *counter.get_mut() = 100;
        assert_eq!(counter.read(), 100);
        assert_eq!(counter.into_inner(), 100);
    }

    #[test]
    fn test_debug_does_not_block_on_held_gate() {
        let counter = SharedCounter::default();
        let _w = counter.begin_write();
        let rendered = format!("{counter:?}");
        assert!(rendered.contains("write_locked: true"));
    }

    #[test]
    #[traced_test]
    fn test_gate_transitions_are_logged() {
        let counter = SharedCounter::new(0);
        let _ = counter.read();
        assert!(logs_contain("First reader entering"));
        assert!(logs_contain("Last reader leaving"));
    }
}
