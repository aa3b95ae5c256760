//! Reader-preferring readers-writers synchronization for a shared counter.
//!
//! This crate provides:
//! - **`WriterGate`**: an ownerless binary lock that one thread can take and
//!   another can release
//! - **`SharedCounter`**: an `i64` guarded by the classic reader-preference
//!   protocol (a reader-count mutex plus a writer gate)
//! - **RAII sessions**: `ReadGuard` and `WriteGuard` release whatever they hold
//!   on every exit path, unwinding included
//!
//! # Examples
//!
//! ```rust
//! use foundation_rwsync::SharedCounter;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let counter = Arc::new(SharedCounter::new(0));
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let counter = Arc::clone(&counter);
//!         thread::spawn(move || {
//!             counter.write(1);
//!             counter.read()
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! assert_eq!(counter.read(), 4);
//! ```
//!
//! # Reader preference
//!
//! Once a reader is inside, later readers join without touching the writer
//! gate. A steady stream of overlapping readers therefore keeps writers out
//! indefinitely. That starvation is the documented behaviour of this lock.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod counter;
pub mod primitives;

pub use counter::{CounterStats, ReadGuard, SharedCounter, WriteGuard};
pub use primitives::WriterGate;
