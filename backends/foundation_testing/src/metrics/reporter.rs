//! Run report generation.

use core::time::Duration;
use std::collections::BTreeMap;
use std::fmt;

use super::LatencyStats;
use crate::analysis;
use crate::harness::{ActorKind, Event, TaskStatus};

/// Summary of one harness run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Wall-clock length of the run
    pub duration: Duration,
    /// Read sessions completed
    pub reads: usize,
    /// Writes applied
    pub writes: usize,
    /// Counter value when the run started
    pub initial_value: i64,
    /// Counter value when the report was built
    pub final_value: i64,
    /// Historical peak of simultaneous readers on the counter
    pub max_concurrent_readers: usize,
    /// Completed reads per reader id
    pub reads_by_reader: BTreeMap<usize, usize>,
    /// Completed writes per writer id
    pub writes_by_writer: BTreeMap<usize, usize>,
    /// Request-to-enter latency of readers
    pub reader_wait: LatencyStats,
    /// Request-to-enter latency of writers
    pub writer_wait: LatencyStats,
    /// Workers that ended by panicking
    pub failed_tasks: Vec<TaskStatus>,
}

impl RunReport {
    /// Builds a report from an event log and the counter's state.
    #[must_use]
    pub fn from_events(
        events: &[Event],
        duration: Duration,
        initial_value: i64,
        final_value: i64,
        max_concurrent_readers: usize,
        failed_tasks: Vec<TaskStatus>,
    ) -> Self {
        Self {
            duration,
            reads: analysis::completed_reads(events),
            writes: analysis::completed_writes(events),
            initial_value,
            final_value,
            max_concurrent_readers,
            reads_by_reader: analysis::operations_by_actor(events, ActorKind::Reader),
            writes_by_writer: analysis::operations_by_actor(events, ActorKind::Writer),
            reader_wait: LatencyStats::from_samples(analysis::wait_latencies(
                events,
                ActorKind::Reader,
            )),
            writer_wait: LatencyStats::from_samples(analysis::wait_latencies(
                events,
                ActorKind::Writer,
            )),
            failed_tasks,
        }
    }

    /// Returns completed operations per second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn operations_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            (self.reads + self.writes) as f64 / secs
        }
    }

    /// Returns the net change of the counter over the run.
    #[must_use]
    pub fn value_delta(&self) -> i64 {
        self.final_value.wrapping_sub(self.initial_value)
    }

    /// Generates a human-readable report.
    #[must_use]
    pub fn to_string_pretty(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Readers-writers run ===\n");
        report.push_str(&format!("Duration: {:?}\n", self.duration));
        report.push_str(&format!("Reads: {}\n", self.reads));
        report.push_str(&format!("Writes: {}\n", self.writes));
        report.push_str(&format!(
            "Value: {} -> {}\n",
            self.initial_value, self.final_value
        ));
        report.push_str(&format!(
            "Max concurrent readers: {}\n",
            self.max_concurrent_readers
        ));
        report.push_str(&format!(
            "Throughput: {:.2} ops/sec\n",
            self.operations_per_second()
        ));

        for (label, stats) in [("Reader", &self.reader_wait), ("Writer", &self.writer_wait)] {
            if stats.is_empty() {
                continue;
            }
            report.push_str(&format!("\n{label} wait (ns):\n"));
            if let Some(min) = stats.min() {
                report.push_str(&format!("  Min: {min}\n"));
            }
            if let Some(avg) = stats.avg() {
                report.push_str(&format!("  Avg: {avg:.0}\n"));
            }
            if let Some(median) = stats.median() {
                report.push_str(&format!("  Median: {median}\n"));
            }
            if let Some(p95) = stats.p95() {
                report.push_str(&format!("  P95: {p95}\n"));
            }
            if let Some(max) = stats.max() {
                report.push_str(&format!("  Max: {max}\n"));
            }
        }

        if !self.failed_tasks.is_empty() {
            report.push_str("\nFailed workers:\n");
            for task in &self.failed_tasks {
                report.push_str(&format!(
                    "  {}-{} after {} operations\n",
                    task.actor, task.actor_id, task.operations
                ));
            }
        }

        report
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_pretty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{Phase, TaskState};

    fn event(seq: u64, actor: ActorKind, phase: Phase, millis: u64) -> Event {
        Event {
            seq,
            actor,
            actor_id: 0,
            phase,
            timestamp: Duration::from_millis(millis),
            value: None,
        }
    }

    #[test]
    fn test_report_from_events() {
        let events = vec![
            event(0, ActorKind::Writer, Phase::Request, 0),
            event(1, ActorKind::Writer, Phase::Enter, 5),
            event(2, ActorKind::Writer, Phase::Mutate, 6),
            event(3, ActorKind::Writer, Phase::Exit, 7),
            event(4, ActorKind::Reader, Phase::Request, 8),
            event(5, ActorKind::Reader, Phase::Enter, 8),
            event(6, ActorKind::Reader, Phase::Exit, 9),
        ];
        let failed = vec![TaskStatus {
            actor: ActorKind::Reader,
            actor_id: 1,
            state: TaskState::Exited,
            operations: 3,
            panicked: true,
        }];

        let report = RunReport::from_events(&events, Duration::from_secs(2), 4, 5, 1, failed);
        assert_eq!(report.reads, 1);
        assert_eq!(report.writes, 1);
        assert_eq!(report.value_delta(), 1);
        assert_eq!(report.writer_wait.max(), Some(5_000_000));
        assert_eq!(report.reader_wait.max(), Some(0));
        assert!((report.operations_per_second() - 1.0).abs() < f64::EPSILON);

        let rendered = report.to_string();
        assert!(rendered.contains("Writes: 1"));
        assert!(rendered.contains("Value: 4 -> 5"));
        assert!(rendered.contains("reader-1 after 3 operations"));
    }
}
