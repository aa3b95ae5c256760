//! Worker harness driving readers and writers against a shared counter.
//!
//! Spawns one thread per reader and per writer. Each worker loops:
//!
//! 1. sleep for a random think time (woken early by `stop`)
//! 2. record `Request`, then enter its critical section
//! 3. record `Enter`, observe or mutate, hold the lock for a random time
//! 4. record `Exit` and leave the critical section
//!
//! Stop requests are honoured only at step 1; a worker never abandons a held
//! lock to stop.
//!
//! # Examples
//!
//! ```
//! use foundation_rwsync::SharedCounter;
//! use foundation_testing::{HarnessConfig, StopCondition, ThinkTime, WorkerHarness};
//! use std::sync::Arc;
//!
//! let counter = Arc::new(SharedCounter::new(0));
//! let config = HarnessConfig::new()
//!     .readers(0)
//!     .writers(5)
//!     .writer_think(ThinkTime::ZERO)
//!     .write_hold(ThinkTime::ZERO);
//!
//! let mut harness = WorkerHarness::new(Arc::clone(&counter), config).unwrap();
//! let report = harness.run(StopCondition::OperationsPerWorker(2)).unwrap();
//!
//! assert_eq!(report.final_value, 10);
//! assert_eq!(report.writes, 10);
//! ```

use core::time::Duration;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::Receiver;
use foundation_rwsync::SharedCounter;

use crate::config::HarnessConfig;
use crate::errors::{HarnessError, HarnessResult};
use crate::metrics::RunReport;

pub mod events;
pub mod signal;
pub mod task;

pub use events::{ActorKind, Event, EventLog, Phase};
pub use signal::StopSignal;
pub use task::{Fault, TaskState, TaskStatus};

use task::{TaskSlot, Worker};

/// When a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// Stop every worker once this much time has passed.
    Elapsed(Duration),
    /// Every worker exits on its own after this many operations.
    OperationsPerWorker(u64),
}

/// Drives a configurable set of reader and writer threads against one
/// [`SharedCounter`] and records what they do.
pub struct WorkerHarness {
    counter: Arc<SharedCounter>,
    config: HarnessConfig,
    log: Arc<EventLog>,
    stop: Arc<StopSignal>,
    faults: Vec<Fault>,
    slots: Vec<Arc<TaskSlot>>,
    handles: Vec<JoinHandle<()>>,
    started_at: Option<Instant>,
    elapsed: Duration,
    initial_value: i64,
}

impl WorkerHarness {
    /// Creates a harness for `counter`.
    ///
    /// Never touches the counter's locks; the starting value is captured by
    /// [`WorkerHarness::start`].
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Configuration` if `config` is invalid.
    pub fn new(counter: Arc<SharedCounter>, config: HarnessConfig) -> HarnessResult<Self> {
        config.validate()?;

        Ok(Self {
            counter,
            config,
            log: Arc::new(EventLog::new()),
            stop: Arc::new(StopSignal::new()),
            faults: Vec::new(),
            slots: Vec::new(),
            handles: Vec::new(),
            started_at: None,
            elapsed: Duration::ZERO,
            initial_value: 0,
        })
    }

    /// Replaces the configuration used by the next run.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::AlreadyRunning` while workers are alive and
    /// `HarnessError::Configuration` if `config` is invalid.
    pub fn configure(&mut self, config: HarnessConfig) -> HarnessResult<()> {
        if self.is_running() {
            return Err(HarnessError::AlreadyRunning);
        }
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Arms a fault for the next run. Meant for tests only.
    pub fn inject_fault(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    /// Spawns every worker and returns immediately.
    ///
    /// The event log is cleared; the counter keeps its value.
    ///
    /// # Blocking
    ///
    /// The starting value is copied under the writer gate, so this waits for
    /// any writer or reader group already inside the counter. Calling it from
    /// a thread that holds a [`foundation_rwsync::ReadGuard`] or
    /// [`foundation_rwsync::WriteGuard`] on the same counter deadlocks.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::AlreadyRunning` if a run is in progress and
    /// `HarnessError::Spawn` if a thread cannot be created, in which case the
    /// workers already spawned are stopped again.
    pub fn start(&mut self, condition: StopCondition) -> HarnessResult<()> {
        if self.is_running() {
            return Err(HarnessError::AlreadyRunning);
        }

        self.log.reset();
        self.stop.reset();
        self.slots.clear();
        self.initial_value = self.counter.peek();
        self.elapsed = Duration::ZERO;
        self.started_at = Some(Instant::now());

        let operation_limit = match condition {
            StopCondition::OperationsPerWorker(count) => Some(count),
            StopCondition::Elapsed(_) => None,
        };

        tracing::info!(
            readers = self.config.get_readers(),
            writers = self.config.get_writers(),
            ?condition,
            "Starting worker harness"
        );

        let readers = (0..self.config.get_readers()).map(|id| (ActorKind::Reader, id));
        let writers = (0..self.config.get_writers()).map(|id| (ActorKind::Writer, id));
        for (index, (actor, actor_id)) in readers.chain(writers).enumerate() {
            if let Err(err) = self.spawn_worker(index, actor, actor_id, operation_limit) {
                tracing::warn!(
                    spawned = self.handles.len(),
                    "Spawn failed, stopping workers already started"
                );
                self.stop();
                return Err(err);
            }
        }

        Ok(())
    }

    fn spawn_worker(
        &mut self,
        index: usize,
        actor: ActorKind,
        actor_id: usize,
        operation_limit: Option<u64>,
    ) -> HarnessResult<()> {
        let slot = Arc::new(TaskSlot::new(actor, actor_id));
        let (think, hold) = match actor {
            ActorKind::Reader => (self.config.get_reader_think(), self.config.get_read_hold()),
            ActorKind::Writer => (self.config.get_writer_think(), self.config.get_write_hold()),
        };
        let fault_on = self
            .faults
            .iter()
            .find(|fault| fault.actor == actor && fault.actor_id == actor_id)
            .map(|fault| fault.on_operation);

        let worker = Worker {
            counter: Arc::clone(&self.counter),
            log: Arc::clone(&self.log),
            stop: Arc::clone(&self.stop),
            slot: Arc::clone(&slot),
            think,
            hold,
            write_delta: self.config.get_write_delta(),
            operation_limit,
            fault_on,
            rng: Worker::rng_for(self.config.get_seed(), index),
        };

        let name = format!("{actor}-{actor_id}");
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker.run())
            .map_err(|source| HarnessError::Spawn { name, source })?;

        self.slots.push(slot);
        self.handles.push(handle);
        Ok(())
    }

    /// Starts a run, waits for `condition`, stops every worker and reports.
    ///
    /// Blocks on the writer gate like [`WorkerHarness::start`] and
    /// [`WorkerHarness::report`].
    ///
    /// # Errors
    ///
    /// Same as [`WorkerHarness::start`].
    pub fn run(&mut self, condition: StopCondition) -> HarnessResult<RunReport> {
        self.start(condition)?;
        match condition {
            StopCondition::Elapsed(duration) => {
                self.stop.wait_timeout(duration);
            }
            StopCondition::OperationsPerWorker(_) => self.join_workers(),
        }
        self.stop();
        Ok(self.report())
    }

    /// Asks every worker to exit at its next checkpoint and waits until all
    /// of them have.
    ///
    /// Workers blocked in a think-time sleep wake immediately; workers inside
    /// a critical section finish it first. Calling `stop` with no run in
    /// progress does nothing.
    pub fn stop(&mut self) {
        if self.handles.is_empty() {
            return;
        }

        for slot in &self.slots {
            slot.request_stop();
        }
        self.stop.raise();
        self.join_workers();

        tracing::info!(
            elapsed = ?self.elapsed,
            events = self.log.len(),
            "Worker harness stopped"
        );
    }

    fn join_workers(&mut self) {
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_owned();
            if let Err(payload) = handle.join() {
                let reason = payload
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| payload.downcast_ref::<&str>().copied())
                    .unwrap_or("unknown panic");
                tracing::error!("Worker {} panicked: {}", name, reason);
            }
        }
        if let Some(started_at) = self.started_at.take() {
            self.elapsed = started_at.elapsed();
        }
    }

    /// Returns true while spawned workers have not been joined.
    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Copies the event log, ordered by sequence number and timestamp.
    pub fn events(&self) -> Vec<Event> {
        self.log.snapshot()
    }

    /// Returns a receiver fed with every event recorded from now on.
    pub fn subscribe(&self) -> Receiver<Event> {
        self.log.subscribe()
    }

    /// Highest number of readers ever inside the counter at once.
    pub fn max_concurrent_readers(&self) -> usize {
        self.counter.max_concurrent_readers()
    }

    /// Status of every worker of the current or last run.
    pub fn task_states(&self) -> Vec<TaskStatus> {
        self.slots.iter().map(|slot| slot.status()).collect()
    }

    /// Workers of the current or last run that ended by panicking.
    pub fn failed_tasks(&self) -> Vec<TaskStatus> {
        self.task_states()
            .into_iter()
            .filter(|status| status.panicked)
            .collect()
    }

    /// The counter shared by every worker.
    pub fn counter(&self) -> &Arc<SharedCounter> {
        &self.counter
    }

    /// Configuration used by the next or current run.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Summarises the current or last run.
    ///
    /// The counter is peeked under the writer gate, so this call waits for
    /// the reader group or writer inside and must not be made while the
    /// calling thread holds a guard on the same counter.
    pub fn report(&self) -> RunReport {
        let elapsed = self
            .started_at
            .map_or(self.elapsed, |started_at| started_at.elapsed());

        RunReport::from_events(
            &self.events(),
            elapsed,
            self.initial_value,
            self.counter.peek(),
            self.max_concurrent_readers(),
            self.failed_tasks(),
        )
    }
}

impl Drop for WorkerHarness {
    fn drop(&mut self) {
        self.stop();
    }
}
