//! Worker harness for exercising a [`foundation_rwsync::SharedCounter`].
//!
//! This crate provides:
//! - **Worker harness**: reader and writer threads with random think and
//!   hold times, cooperative stop and panic bookkeeping
//! - **Event log**: totally ordered `Request`/`Enter`/`Exit` records with a
//!   live subscription feed
//! - **Analysis**: mutual-exclusion checks, operation counts and wait
//!   latencies computed from the log
//! - **Presets and config files**: named workloads and TOML loading
//!
//! # Examples
//!
//! ```rust
//! use foundation_rwsync::SharedCounter;
//! use foundation_testing::analysis;
//! use foundation_testing::{HarnessConfig, StopCondition, ThinkTime, WorkerHarness};
//! use std::sync::Arc;
//!
//! let config = HarnessConfig::new()
//!     .readers(2)
//!     .writers(3)
//!     .reader_think(ThinkTime::ZERO)
//!     .writer_think(ThinkTime::ZERO)
//!     .read_hold(ThinkTime::ZERO)
//!     .write_hold(ThinkTime::ZERO)
//!     .seed(42);
//!
//! let counter = Arc::new(SharedCounter::new(0));
//! let mut harness = WorkerHarness::new(Arc::clone(&counter), config).unwrap();
//! let report = harness.run(StopCondition::OperationsPerWorker(10)).unwrap();
//!
//! assert_eq!(report.writes, 30);
//! assert_eq!(counter.read(), 30);
//! assert!(analysis::check_mutual_exclusion(&harness.events()).is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analysis;
pub mod config;
pub mod errors;
pub mod harness;
pub mod metrics;
pub mod scenarios;

pub use config::{ConfigurationError, HarnessConfig, ThinkTime, MAX_WORKERS};
pub use errors::{HarnessError, HarnessResult};
pub use harness::{
    ActorKind, Event, Fault, Phase, StopCondition, TaskState, TaskStatus, WorkerHarness,
};
pub use metrics::{LatencyStats, RunReport};
pub use scenarios::{preset, Scenario};
