//! Worker task bodies and their lifecycle bookkeeping.

use core::time::Duration;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

use derive_more::Display;
use foundation_rwsync::SharedCounter;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::events::{ActorKind, EventLog, Phase};
use super::signal::StopSignal;
use crate::config::ThinkTime;

/// Lifecycle of a worker: `Idle -> Running -> StopRequested -> Exited`.
///
/// A worker that finishes its operation budget goes straight from `Running`
/// to `Exited`.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Spawned, not yet looping
    #[display("idle")]
    Idle = 0,
    /// Looping through operations
    #[display("running")]
    Running = 1,
    /// Will exit at its next checkpoint
    #[display("stop-requested")]
    StopRequested = 2,
    /// Thread body has returned or unwound
    #[display("exited")]
    Exited = 3,
}

impl TaskState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::StopRequested,
            _ => Self::Exited,
        }
    }
}

/// Test hook: makes one worker panic inside its critical section.
///
/// The worker panics right after recording `Enter` on its `on_operation`-th
/// operation (1-based), before it observes or mutates the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// Kind of the faulty worker
    pub actor: ActorKind,
    /// Id of the faulty worker within its kind
    pub actor_id: usize,
    /// 1-based operation that panics
    pub on_operation: u64,
}

impl Fault {
    /// Creates a fault for one worker.
    #[must_use]
    pub const fn new(actor: ActorKind, actor_id: usize, on_operation: u64) -> Self {
        Self {
            actor,
            actor_id,
            on_operation,
        }
    }
}

/// Point-in-time view of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStatus {
    /// Kind of the worker
    pub actor: ActorKind,
    /// Id of the worker within its kind
    pub actor_id: usize,
    /// Lifecycle state at the time of the call
    pub state: TaskState,
    /// Operations completed, i.e. critical sections left normally.
    pub operations: u64,
    /// The worker thread ended by unwinding.
    pub panicked: bool,
}

/// Shared state of one worker, readable by the harness while it runs.
#[derive(Debug)]
pub(crate) struct TaskSlot {
    actor: ActorKind,
    actor_id: usize,
    state: AtomicU8,
    operations: AtomicU64,
    panicked: AtomicBool,
}

impl TaskSlot {
    pub(crate) fn new(actor: ActorKind, actor_id: usize) -> Self {
        Self {
            actor,
            actor_id,
            state: AtomicU8::new(TaskState::Idle as u8),
            operations: AtomicU64::new(0),
            panicked: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Asks a not-yet-exited worker to stop at its next checkpoint.
    pub(crate) fn request_stop(&self) {
        if !self.transition(TaskState::Running, TaskState::StopRequested) {
            self.transition(TaskState::Idle, TaskState::StopRequested);
        }
    }

    fn mark_exited(&self, panicked: bool) {
        if panicked {
            self.panicked.store(true, Ordering::Release);
        }
        self.state.store(TaskState::Exited as u8, Ordering::Release);
    }

    pub(crate) fn status(&self) -> TaskStatus {
        TaskStatus {
            actor: self.actor,
            actor_id: self.actor_id,
            state: self.state(),
            operations: self.operations.load(Ordering::Acquire),
            panicked: self.panicked.load(Ordering::Acquire),
        }
    }
}

/// Marks the slot exited however the worker body ends.
struct ExitMarker<'a>(&'a TaskSlot);

impl Drop for ExitMarker<'_> {
    fn drop(&mut self) {
        self.0.mark_exited(thread::panicking());
    }
}

/// Records `Abort` if the critical section unwinds.
///
/// Declared after the lock guard so it drops first, while the lock is still
/// held.
struct AbortRecorder<'a> {
    log: &'a EventLog,
    actor: ActorKind,
    actor_id: usize,
}

impl Drop for AbortRecorder<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.log
                .record(self.actor, self.actor_id, Phase::Abort, None);
        }
    }
}

/// Everything one worker thread owns.
pub(crate) struct Worker {
    pub(crate) counter: Arc<SharedCounter>,
    pub(crate) log: Arc<EventLog>,
    pub(crate) stop: Arc<StopSignal>,
    pub(crate) slot: Arc<TaskSlot>,
    pub(crate) think: ThinkTime,
    pub(crate) hold: ThinkTime,
    pub(crate) write_delta: i64,
    pub(crate) operation_limit: Option<u64>,
    pub(crate) fault_on: Option<u64>,
    pub(crate) rng: ChaCha8Rng,
}

impl Worker {
    /// Builds the random source for a worker: derived from the run seed when
    /// one is configured, fresh entropy otherwise.
    pub(crate) fn rng_for(seed: Option<u64>, worker_index: usize) -> ChaCha8Rng {
        match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(worker_index as u64)),
            None => ChaCha8Rng::seed_from_u64(rand::random()),
        }
    }

    /// Worker thread body.
    pub(crate) fn run(mut self) {
        let slot = Arc::clone(&self.slot);
        let _exit = ExitMarker(&slot);
        slot.transition(TaskState::Idle, TaskState::Running);
        tracing::debug!("{}-{} started", slot.actor, slot.actor_id);

        let mut completed = 0u64;
        loop {
            if slot.state() != TaskState::Running || self.stop.is_raised() {
                break;
            }
            if self.operation_limit.is_some_and(|limit| completed >= limit) {
                break;
            }

            let think = self.think.sample(&mut self.rng);
            if self.stop.wait_timeout(think) {
                break;
            }

            let operation = completed + 1;
            match slot.actor {
                ActorKind::Reader => self.read_once(operation),
                ActorKind::Writer => self.write_once(operation),
            }

            completed = operation;
            slot.operations.store(completed, Ordering::Release);
        }

        tracing::debug!(
            "{}-{} exiting after {} operations",
            slot.actor,
            slot.actor_id,
            completed
        );
    }

    fn hold_for(&mut self) -> Duration {
        self.hold.sample(&mut self.rng)
    }

    fn inject_fault(&self, operation: u64) {
        if self.fault_on == Some(operation) {
            panic!(
                "injected fault: {}-{} aborting operation {operation} inside its critical section",
                self.slot.actor, self.slot.actor_id
            );
        }
    }

    fn read_once(&mut self, operation: u64) {
        let (actor, id) = (self.slot.actor, self.slot.actor_id);
        let hold = self.hold_for();

        self.log.record(actor, id, Phase::Request, None);
        let guard = self.counter.begin_read();
        let _abort = AbortRecorder {
            log: &self.log,
            actor,
            actor_id: id,
        };

        let value = guard.value();
        self.log.record(actor, id, Phase::Enter, Some(value));
        self.inject_fault(operation);
        self.log.record(actor, id, Phase::Observe, Some(value));

        if !hold.is_zero() {
            thread::sleep(hold);
        }

        self.log.record(actor, id, Phase::Exit, Some(value));
    }

    fn write_once(&mut self, operation: u64) {
        let (actor, id) = (self.slot.actor, self.slot.actor_id);
        let hold = self.hold_for();

        self.log.record(actor, id, Phase::Request, None);
        let mut guard = self.counter.begin_write();
        let _abort = AbortRecorder {
            log: &self.log,
            actor,
            actor_id: id,
        };

        self.log.record(actor, id, Phase::Enter, Some(guard.value()));
        self.inject_fault(operation);
        let value = guard.add(self.write_delta);
        self.log.record(actor, id, Phase::Mutate, Some(value));

        if !hold.is_zero() {
            thread::sleep(hold);
        }

        self.log.record(actor, id, Phase::Exit, Some(value));
    }
}
