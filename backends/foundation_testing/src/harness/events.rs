//! Event log shared by every worker of a harness run.
//!
//! Events get their sequence number and timestamp while the log's mutex is
//! held, so `seq` order and timestamp order always agree.

use core::fmt;
use core::time::Duration;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crossbeam::channel::{self, Receiver, Sender};
use derive_more::Display;

/// Which side of the protocol an actor plays.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActorKind {
    /// Shared access
    #[display("reader")]
    Reader,
    /// Exclusive access
    #[display("writer")]
    Writer,
}

/// Step of one operation.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Arrived, about to block on a lock.
    #[display("request")]
    Request,
    /// Inside the critical section.
    #[display("enter")]
    Enter,
    /// A reader looked at the value.
    #[display("observe")]
    Observe,
    /// A writer changed the value.
    #[display("mutate")]
    Mutate,
    /// About to leave the critical section.
    #[display("exit")]
    Exit,
    /// Leaving the critical section by unwinding.
    #[display("abort")]
    Abort,
}

/// One recorded step of a reader or writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Position in the log, starting at 0.
    pub seq: u64,
    /// Kind of the actor that recorded the event.
    pub actor: ActorKind,
    /// Id of the actor within its kind.
    pub actor_id: usize,
    /// Step being recorded.
    pub phase: Phase,
    /// Time since the log was created or last reset.
    pub timestamp: Duration,
    /// Counter value seen by the actor; `None` before it holds a lock.
    pub value: Option<i64>,
}

impl Event {
    /// Returns true for the phases that close a critical section.
    #[must_use]
    pub const fn is_exit(&self) -> bool {
        matches!(self.phase, Phase::Exit | Phase::Abort)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>10.4}s] #{:<6} {}-{} {}",
            self.timestamp.as_secs_f64(),
            self.seq,
            self.actor,
            self.actor_id,
            self.phase
        )?;
        if let Some(value) = self.value {
            write!(f, " value={value}")?;
        }
        Ok(())
    }
}

struct LogState {
    epoch: Instant,
    events: Vec<Event>,
    subscribers: Vec<Sender<Event>>,
}

/// Append-only, thread-safe event log with live subscribers.
pub struct EventLog {
    state: Mutex<LogState>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog").field("len", &self.len()).finish()
    }
}

impl EventLog {
    /// Creates an empty log whose clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LogState {
                epoch: Instant::now(),
                events: Vec::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    // Appends never leave the vector half-written, so a poisoned log is
    // still consistent.
    fn lock(&self) -> MutexGuard<'_, LogState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Appends an event and forwards it to every live subscriber.
    pub fn record(
        &self,
        actor: ActorKind,
        actor_id: usize,
        phase: Phase,
        value: Option<i64>,
    ) -> Event {
        let mut state = self.lock();
        let event = Event {
            seq: state.events.len() as u64,
            actor,
            actor_id,
            phase,
            timestamp: state.epoch.elapsed(),
            value,
        };
        state.events.push(event);
        state
            .subscribers
            .retain(|subscriber| subscriber.send(event).is_ok());
        event
    }

    /// Returns a receiver fed with every event recorded from now on.
    ///
    /// Dropping the receiver unsubscribes it on the next append.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (sender, receiver) = channel::unbounded();
        self.lock().subscribers.push(sender);
        receiver
    }

    /// Copies every event recorded so far, in `seq` order.
    pub fn snapshot(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    /// Drops recorded events and restarts the clock; subscribers stay.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.events.clear();
        state.epoch = Instant::now();
    }

    /// Number of events recorded since the last reset.
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    /// Returns true if nothing was recorded since the last reset.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
