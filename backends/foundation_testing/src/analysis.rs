//! Checks over a recorded event log.
//!
//! Every function here takes events in `seq` order, as returned by
//! [`crate::WorkerHarness::events`], and works on a partial log too: a
//! critical section that has been entered but not yet left is treated as
//! still open.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::harness::{ActorKind, Event, Phase};

/// One critical section, from `Enter` to `Exit` or `Abort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    /// Kind of the actor holding the section.
    pub actor: ActorKind,
    /// Id of the actor within its kind.
    pub actor_id: usize,
    /// `seq` of the `Enter` event.
    pub start_seq: u64,
    /// `None` while the section is still open.
    pub end_seq: Option<u64>,
    /// Timestamp of the `Enter` event.
    pub start: Duration,
    /// Timestamp of the closing event, if any.
    pub end: Option<Duration>,
    /// Closed by `Abort` rather than `Exit`.
    pub aborted: bool,
}

impl Interval {
    fn end_key(&self) -> u64 {
        self.end_seq.unwrap_or(u64::MAX)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} [#{}, ", self.actor, self.actor_id, self.start_seq)?;
        match self.end_seq {
            Some(end) => write!(f, "#{end}]"),
            None => write!(f, "open)"),
        }
    }
}

/// A writer's critical section overlapped another critical section.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("mutual exclusion violated: {writer} overlaps {other}")]
pub struct ExclusionViolation {
    /// The writer's section.
    pub writer: Interval,
    /// The reader or writer section it overlaps.
    pub other: Interval,
}

/// Pairs every `Enter` with the next `Exit`/`Abort` of the same actor.
///
/// The result is sorted by `start_seq`.
pub fn intervals(events: &[Event]) -> Vec<Interval> {
    let mut open: HashMap<(ActorKind, usize), Interval> = HashMap::new();
    let mut closed = Vec::new();

    for event in events {
        let key = (event.actor, event.actor_id);
        match event.phase {
            Phase::Enter => {
                open.insert(
                    key,
                    Interval {
                        actor: event.actor,
                        actor_id: event.actor_id,
                        start_seq: event.seq,
                        end_seq: None,
                        start: event.timestamp,
                        end: None,
                        aborted: false,
                    },
                );
            }
            Phase::Exit | Phase::Abort => {
                if let Some(mut interval) = open.remove(&key) {
                    interval.end_seq = Some(event.seq);
                    interval.end = Some(event.timestamp);
                    interval.aborted = event.phase == Phase::Abort;
                    closed.push(interval);
                }
            }
            Phase::Request | Phase::Observe | Phase::Mutate => {}
        }
    }

    closed.extend(open.into_values());
    closed.sort_by_key(|interval| interval.start_seq);
    closed
}

/// Verifies that no writer interval overlaps any other interval.
///
/// Reader intervals may overlap each other freely.
///
/// # Errors
///
/// Returns the first overlap found, in `seq` order.
pub fn check_mutual_exclusion(events: &[Event]) -> Result<(), ExclusionViolation> {
    // Sorted by start, an interval overlaps an earlier one exactly when some
    // earlier interval ends after it starts.
    let mut latest_any: Option<Interval> = None;
    let mut latest_writer: Option<Interval> = None;

    for interval in intervals(events) {
        let blocker = match interval.actor {
            ActorKind::Writer => latest_any,
            ActorKind::Reader => latest_writer,
        };
        if let Some(earlier) = blocker {
            if earlier.end_key() > interval.start_seq {
                let (writer, other) = match earlier.actor {
                    ActorKind::Writer => (earlier, interval),
                    ActorKind::Reader => (interval, earlier),
                };
                return Err(ExclusionViolation { writer, other });
            }
        }

        if latest_any.is_none_or(|latest| interval.end_key() > latest.end_key()) {
            latest_any = Some(interval);
        }
        if interval.actor == ActorKind::Writer
            && latest_writer.is_none_or(|latest| interval.end_key() > latest.end_key())
        {
            latest_writer = Some(interval);
        }
    }

    Ok(())
}

/// Number of writes applied to the counter.
pub fn completed_writes(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|event| event.actor == ActorKind::Writer && event.phase == Phase::Mutate)
        .count()
}

/// Number of read sessions that ended normally.
pub fn completed_reads(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|event| event.actor == ActorKind::Reader && event.phase == Phase::Exit)
        .count()
}

/// Completed operations per actor id of the given kind.
///
/// Ids that never completed an operation do not appear.
pub fn operations_by_actor(events: &[Event], kind: ActorKind) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for event in events {
        if event.actor == kind && event.phase == Phase::Exit {
            *counts.entry(event.actor_id).or_insert(0) += 1;
        }
    }
    counts
}

/// Highest number of reader intervals open at the same time.
pub fn peak_overlapping_readers(events: &[Event]) -> usize {
    let mut inside = 0usize;
    let mut peak = 0usize;
    for event in events.iter().filter(|event| event.actor == ActorKind::Reader) {
        match event.phase {
            Phase::Enter => {
                inside += 1;
                peak = peak.max(inside);
            }
            Phase::Exit | Phase::Abort => inside = inside.saturating_sub(1),
            Phase::Request | Phase::Observe | Phase::Mutate => {}
        }
    }
    peak
}

/// Time from `Request` to `Enter`, in nanoseconds, for every operation of
/// `kind` that got its lock.
#[allow(clippy::cast_possible_truncation)]
pub fn wait_latencies(events: &[Event], kind: ActorKind) -> Vec<u64> {
    let mut requested: HashMap<usize, Duration> = HashMap::new();
    let mut latencies = Vec::new();

    for event in events.iter().filter(|event| event.actor == kind) {
        match event.phase {
            Phase::Request => {
                requested.insert(event.actor_id, event.timestamp);
            }
            Phase::Enter => {
                if let Some(at) = requested.remove(&event.actor_id) {
                    let waited = event.timestamp.saturating_sub(at);
                    latencies.push(waited.as_nanos().min(u128::from(u64::MAX)) as u64);
                }
            }
            _ => {}
        }
    }

    latencies
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Script {
        events: Vec<Event>,
    }

    impl Script {
        fn new() -> Self {
            Self { events: Vec::new() }
        }

        fn push(mut self, actor: ActorKind, actor_id: usize, phase: Phase) -> Self {
            let seq = self.events.len() as u64;
            self.events.push(Event {
                seq,
                actor,
                actor_id,
                phase,
                timestamp: Duration::from_millis(seq * 10),
                value: None,
            });
            self
        }

        fn read(self, id: usize, phase: Phase) -> Self {
            self.push(ActorKind::Reader, id, phase)
        }

        fn write(self, id: usize, phase: Phase) -> Self {
            self.push(ActorKind::Writer, id, phase)
        }
    }

    #[test]
    fn test_overlapping_readers_are_allowed() {
        let events = Script::new()
            .read(0, Phase::Enter)
            .read(1, Phase::Enter)
            .read(0, Phase::Exit)
            .read(1, Phase::Exit)
            .write(0, Phase::Enter)
            .write(0, Phase::Mutate)
            .write(0, Phase::Exit)
            .events;

        assert!(check_mutual_exclusion(&events).is_ok());
        assert_eq!(peak_overlapping_readers(&events), 2);
        assert_eq!(completed_reads(&events), 2);
        assert_eq!(completed_writes(&events), 1);
    }

    #[test]
    fn test_writer_inside_reader_is_reported() {
        let events = Script::new()
            .read(0, Phase::Enter)
            .write(1, Phase::Enter)
            .write(1, Phase::Exit)
            .read(0, Phase::Exit)
            .events;

        let violation = check_mutual_exclusion(&events).unwrap_err();
        assert_eq!(violation.writer.actor, ActorKind::Writer);
        assert_eq!(violation.writer.actor_id, 1);
        assert_eq!(violation.other.actor, ActorKind::Reader);
    }

    #[test]
    fn test_reader_entering_during_writer_is_reported() {
        let events = Script::new()
            .write(0, Phase::Enter)
            .read(3, Phase::Enter)
            .read(3, Phase::Exit)
            .write(0, Phase::Exit)
            .events;

        let violation = check_mutual_exclusion(&events).unwrap_err();
        assert_eq!(violation.writer.actor_id, 0);
        assert_eq!(violation.other.actor_id, 3);
    }

    #[test]
    fn test_open_writer_blocks_everything_after_it() {
        let events = Script::new()
            .write(0, Phase::Enter)
            .write(1, Phase::Enter)
            .events;

        assert!(check_mutual_exclusion(&events).is_err());
        assert!(intervals(&events).iter().all(|interval| interval.end_seq.is_none()));
    }

    #[test]
    fn test_aborted_interval_closes_section() {
        let events = Script::new()
            .write(0, Phase::Enter)
            .write(0, Phase::Abort)
            .write(1, Phase::Enter)
            .write(1, Phase::Mutate)
            .write(1, Phase::Exit)
            .events;

        assert!(check_mutual_exclusion(&events).is_ok());
        let all = intervals(&events);
        assert!(all[0].aborted);
        assert!(!all[1].aborted);
        assert_eq!(completed_writes(&events), 1);
    }

    #[test]
    fn test_operations_by_actor_and_latencies() {
        let events = Script::new()
            .write(0, Phase::Request)
            .write(0, Phase::Enter)
            .write(0, Phase::Exit)
            .write(1, Phase::Request)
            .write(1, Phase::Enter)
            .write(1, Phase::Exit)
            .write(1, Phase::Request)
            .write(1, Phase::Enter)
            .write(1, Phase::Exit)
            .events;

        let counts = operations_by_actor(&events, ActorKind::Writer);
        assert_eq!(counts.get(&0), Some(&1));
        assert_eq!(counts.get(&1), Some(&2));

        let latencies = wait_latencies(&events, ActorKind::Writer);
        assert_eq!(latencies, vec![10_000_000; 3]);
        assert!(wait_latencies(&events, ActorKind::Reader).is_empty());
    }
}
