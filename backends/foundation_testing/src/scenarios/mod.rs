//! Named workload presets.
//!
//! Each preset pairs a [`HarnessConfig`] with a suggested run length. The
//! `many_readers` preset keeps the reader group busy enough that the single
//! writer is starved most of the time.

use core::time::Duration;

use crate::config::{HarnessConfig, ThinkTime};
use crate::harness::StopCondition;

/// Names accepted by [`preset`], in display order.
pub const PRESET_NAMES: [&str; 6] = [
    "default",
    "many_readers",
    "many_writers",
    "balanced",
    "high_concurrency",
    "stress",
];

/// A named workload.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Preset name, one of [`PRESET_NAMES`]
    pub name: &'static str,
    /// One-line summary for listings
    pub description: &'static str,
    /// Worker counts and timings
    pub config: HarnessConfig,
    /// Suggested run length
    pub duration: Duration,
}

impl Scenario {
    /// Stop condition running the scenario for its suggested duration.
    #[must_use]
    pub const fn stop_condition(&self) -> StopCondition {
        StopCondition::Elapsed(self.duration)
    }
}

/// Returns the names of every preset.
#[must_use]
pub fn preset_names() -> &'static [&'static str] {
    &PRESET_NAMES
}

/// Looks a preset up by name.
#[must_use]
pub fn preset(name: &str) -> Option<Scenario> {
    let scenario = match name {
        "default" => Scenario {
            name: "default",
            description: "3 readers, 2 writers, relaxed pacing",
            config: HarnessConfig::new(),
            duration: Duration::from_secs(10),
        },
        "many_readers" => Scenario {
            name: "many_readers",
            description: "8 fast readers against 1 slow writer",
            config: HarnessConfig::new()
                .readers(8)
                .writers(1)
                .reader_think(ThinkTime::new(0.1, 0.3))
                .writer_think(ThinkTime::new(0.5, 1.0))
                .read_hold(ThinkTime::new(0.1, 0.2))
                .write_hold(ThinkTime::new(0.5, 1.0)),
            duration: Duration::from_secs(15),
        },
        "many_writers" => Scenario {
            name: "many_writers",
            description: "1 reader, 6 writers contending for the gate",
            config: HarnessConfig::new()
                .readers(1)
                .writers(6)
                .reader_think(ThinkTime::new(1.0, 2.0))
                .writer_think(ThinkTime::new(0.2, 0.5))
                .read_hold(ThinkTime::new(0.2, 0.4))
                .write_hold(ThinkTime::new(0.1, 0.3)),
            duration: Duration::from_secs(12),
        },
        "balanced" => Scenario {
            name: "balanced",
            description: "4 readers, 4 writers, same pacing",
            config: HarnessConfig::new()
                .readers(4)
                .writers(4)
                .reader_think(ThinkTime::new(0.5, 1.0))
                .writer_think(ThinkTime::new(0.5, 1.0))
                .read_hold(ThinkTime::new(0.3, 0.6))
                .write_hold(ThinkTime::new(0.3, 0.6)),
            duration: Duration::from_secs(10),
        },
        "high_concurrency" => Scenario {
            name: "high_concurrency",
            description: "10 readers, 5 writers, short sections",
            config: HarnessConfig::new()
                .readers(10)
                .writers(5)
                .reader_think(ThinkTime::new(0.1, 0.2))
                .writer_think(ThinkTime::new(0.1, 0.3))
                .read_hold(ThinkTime::new(0.05, 0.1))
                .write_hold(ThinkTime::new(0.05, 0.15)),
            duration: Duration::from_secs(8),
        },
        "stress" => Scenario {
            name: "stress",
            description: "15 readers, 8 writers, near-continuous traffic",
            config: HarnessConfig::new()
                .readers(15)
                .writers(8)
                .reader_think(ThinkTime::new(0.01, 0.05))
                .writer_think(ThinkTime::new(0.01, 0.1))
                .read_hold(ThinkTime::new(0.01, 0.05))
                .write_hold(ThinkTime::new(0.02, 0.08)),
            duration: Duration::from_secs(5),
        },
        _ => return None,
    };
    Some(scenario)
}

/// Every preset, in [`PRESET_NAMES`] order.
pub fn presets() -> impl Iterator<Item = Scenario> {
    PRESET_NAMES.iter().filter_map(|name| preset(name))
}
