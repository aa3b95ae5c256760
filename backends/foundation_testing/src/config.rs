//! Harness configuration.
//!
//! A [`HarnessConfig`] is built in code with the `const fn` builder methods or
//! loaded from TOML with [`from_path`] / [`from_toml_str`]:
//!
//! ```toml
//! readers = 3
//! writers = 2
//! seed = 7
//! reader_think = { min_secs = 0.5, max_secs = 2.0 }
//! writer_think = { min_secs = 1.0, max_secs = 3.0 }
//! ```
//!
//! Keys left out of the file keep the values of [`HarnessConfig::new`].

use core::time::Duration;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::HarnessResult;

/// Upper bound on the number of worker threads one harness may spawn.
pub const MAX_WORKERS: usize = 1024;

/// Configuration errors, reported before any thread is spawned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Both counts are zero.
    #[error("harness needs at least one reader or writer")]
    NoWorkers,

    /// More threads than [`MAX_WORKERS`].
    #[error("{requested} workers requested, at most {max} allowed")]
    TooManyWorkers {
        /// Readers plus writers asked for
        requested: usize,
        /// The [`MAX_WORKERS`] limit
        max: usize,
    },

    /// A count read from a file was below zero.
    #[error("{field} must not be negative, got {value}")]
    NegativeCount {
        /// Key that held the count
        field: &'static str,
        /// Value found in the file
        value: i64,
    },

    /// A time bound that is negative, NaN or infinite.
    #[error("{field} must be a finite, non-negative number of seconds, got {value}")]
    InvalidDuration {
        /// Range the bound belongs to
        field: &'static str,
        /// Offending bound in seconds
        value: f64,
    },

    /// A time range whose lower bound exceeds its upper bound.
    #[error("{field} range is inverted: min {min}s > max {max}s")]
    InvertedRange {
        /// Name of the range
        field: &'static str,
        /// Lower bound in seconds
        min: f64,
        /// Upper bound in seconds
        max: f64,
    },
}

/// A uniform range of seconds a worker spends sleeping or holding a lock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThinkTime {
    /// Lower bound in seconds
    pub min_secs: f64,
    /// Upper bound in seconds
    pub max_secs: f64,
}

impl ThinkTime {
    /// No delay at all.
    pub const ZERO: Self = Self::fixed(0.0);

    /// Creates a range of `min_secs..=max_secs`.
    #[must_use]
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    /// Creates a range that always yields `secs`.
    #[must_use]
    pub const fn fixed(secs: f64) -> Self {
        Self::new(secs, secs)
    }

    /// Creates a range from whole milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn from_millis(min: u64, max: u64) -> Self {
        Self::new(min as f64 / 1000.0, max as f64 / 1000.0)
    }

    /// Checks the range, naming `field` in the error.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDuration` for negative or non-finite bounds and
    /// `InvertedRange` when `min_secs > max_secs`.
    pub fn validate(&self, field: &'static str) -> Result<(), ConfigurationError> {
        for value in [self.min_secs, self.max_secs] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidDuration { field, value });
            }
        }
        if self.min_secs > self.max_secs {
            return Err(ConfigurationError::InvertedRange {
                field,
                min: self.min_secs,
                max: self.max_secs,
            });
        }
        Ok(())
    }

    /// Draws a duration from the range.
    ///
    /// The range must have passed [`ThinkTime::validate`].
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        #[allow(clippy::float_cmp)]
        let secs = if self.min_secs == self.max_secs {
            self.min_secs
        } else {
            rng.random_range(self.min_secs..=self.max_secs)
        };
        Duration::from_secs_f64(secs)
    }

    /// Returns true if the range can only yield zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.max_secs <= 0.0
    }
}

impl Default for ThinkTime {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Configuration for a [`crate::WorkerHarness`] run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarnessConfig {
    /// Number of reader threads
    readers: usize,
    /// Number of writer threads
    writers: usize,
    /// Sleep between two reads of the same reader
    reader_think: ThinkTime,
    /// Sleep between two writes of the same writer
    writer_think: ThinkTime,
    /// Time a reader stays inside the read critical section
    read_hold: ThinkTime,
    /// Time a writer stays inside the write critical section
    write_hold: ThinkTime,
    /// Amount each write adds to the counter
    write_delta: i64,
    /// Seed for deterministic think times
    seed: Option<u64>,
}

impl HarnessConfig {
    /// Creates a configuration with default values.
    ///
    /// Defaults:
    /// - `readers`: 3, `writers`: 2
    /// - `reader_think`: 0.5s..2.0s, `writer_think`: 1.0s..3.0s
    /// - `read_hold`, `write_hold`: 0.3s..1.0s
    /// - `write_delta`: 1
    /// - `seed`: None (fresh entropy per run)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            readers: 3,
            writers: 2,
            reader_think: ThinkTime::new(0.5, 2.0),
            writer_think: ThinkTime::new(1.0, 3.0),
            read_hold: ThinkTime::new(0.3, 1.0),
            write_hold: ThinkTime::new(0.3, 1.0),
            write_delta: 1,
            seed: None,
        }
    }

    /// Sets the reader and writer counts and think-time ranges in one call
    /// and validates the result.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found.
    pub fn configure(
        readers: usize,
        writers: usize,
        reader_think: ThinkTime,
        writer_think: ThinkTime,
    ) -> Result<Self, ConfigurationError> {
        let config = Self::new()
            .readers(readers)
            .writers(writers)
            .reader_think(reader_think)
            .writer_think(writer_think);
        config.validate()?;
        Ok(config)
    }

    /// Sets the number of reader threads.
    #[must_use]
    pub const fn readers(mut self, count: usize) -> Self {
        self.readers = count;
        self
    }

    /// Sets the number of writer threads.
    #[must_use]
    pub const fn writers(mut self, count: usize) -> Self {
        self.writers = count;
        self
    }

    /// Sets the reader think-time range.
    #[must_use]
    pub const fn reader_think(mut self, range: ThinkTime) -> Self {
        self.reader_think = range;
        self
    }

    /// Sets the writer think-time range.
    #[must_use]
    pub const fn writer_think(mut self, range: ThinkTime) -> Self {
        self.writer_think = range;
        self
    }

    /// Sets how long a reader stays inside its critical section.
    #[must_use]
    pub const fn read_hold(mut self, range: ThinkTime) -> Self {
        self.read_hold = range;
        self
    }

    /// Sets how long a writer stays inside its critical section.
    #[must_use]
    pub const fn write_hold(mut self, range: ThinkTime) -> Self {
        self.write_hold = range;
        self
    }

    /// Sets the amount each write adds.
    #[must_use]
    pub const fn write_delta(mut self, delta: i64) -> Self {
        self.write_delta = delta;
        self
    }

    /// Seeds every worker's random source so think times repeat across runs.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Returns the reader count.
    #[must_use]
    pub const fn get_readers(&self) -> usize {
        self.readers
    }

    /// Returns the writer count.
    #[must_use]
    pub const fn get_writers(&self) -> usize {
        self.writers
    }

    /// Returns the total number of worker threads.
    #[must_use]
    pub const fn get_workers(&self) -> usize {
        self.readers + self.writers
    }

    /// Returns the reader think-time range.
    #[must_use]
    pub const fn get_reader_think(&self) -> ThinkTime {
        self.reader_think
    }

    /// Returns the writer think-time range.
    #[must_use]
    pub const fn get_writer_think(&self) -> ThinkTime {
        self.writer_think
    }

    /// Returns the read hold range.
    #[must_use]
    pub const fn get_read_hold(&self) -> ThinkTime {
        self.read_hold
    }

    /// Returns the write hold range.
    #[must_use]
    pub const fn get_write_hold(&self) -> ThinkTime {
        self.write_hold
    }

    /// Returns the write delta.
    #[must_use]
    pub const fn get_write_delta(&self) -> i64 {
        self.write_delta
    }

    /// Returns the seed, if any.
    #[must_use]
    pub const fn get_seed(&self) -> Option<u64> {
        self.seed
    }

    /// Checks worker counts and every time range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let requested = self.readers.saturating_add(self.writers);
        if requested == 0 {
            return Err(ConfigurationError::NoWorkers);
        }
        if requested > MAX_WORKERS {
            return Err(ConfigurationError::TooManyWorkers {
                requested,
                max: MAX_WORKERS,
            });
        }

        self.reader_think.validate("reader_think")?;
        self.writer_think.validate("writer_think")?;
        self.read_hold.validate("read_hold")?;
        self.write_hold.validate("write_hold")?;
        Ok(())
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk shape of a [`HarnessConfig`].
///
/// Counts are signed so that a negative count is reported as a
/// configuration error rather than a parse error.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct HarnessConfigFile {
    readers: Option<i64>,
    writers: Option<i64>,
    reader_think: Option<ThinkTime>,
    writer_think: Option<ThinkTime>,
    read_hold: Option<ThinkTime>,
    write_hold: Option<ThinkTime>,
    write_delta: Option<i64>,
    seed: Option<u64>,
}

fn worker_count(field: &'static str, value: i64) -> Result<usize, ConfigurationError> {
    usize::try_from(value).map_err(|_| ConfigurationError::NegativeCount { field, value })
}

impl TryFrom<HarnessConfigFile> for HarnessConfig {
    type Error = ConfigurationError;

    fn try_from(file: HarnessConfigFile) -> Result<Self, Self::Error> {
        let defaults = Self::new();
        let mut config = Self {
            readers: defaults.readers,
            writers: defaults.writers,
            reader_think: file.reader_think.unwrap_or(defaults.reader_think),
            writer_think: file.writer_think.unwrap_or(defaults.writer_think),
            read_hold: file.read_hold.unwrap_or(defaults.read_hold),
            write_hold: file.write_hold.unwrap_or(defaults.write_hold),
            write_delta: file.write_delta.unwrap_or(defaults.write_delta),
            seed: file.seed,
        };
        if let Some(readers) = file.readers {
            config.readers = worker_count("readers", readers)?;
        }
        if let Some(writers) = file.writers {
            config.writers = worker_count("writers", writers)?;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Parses and validates a TOML configuration.
///
/// # Errors
///
/// Returns `HarnessError::Parse` for malformed TOML and
/// `HarnessError::Configuration` for values that fail validation.
pub fn from_toml_str(content: &str) -> HarnessResult<HarnessConfig> {
    let file: HarnessConfigFile = toml::from_str(content)?;
    Ok(HarnessConfig::try_from(file)?)
}

/// Reads, parses and validates a TOML configuration file.
///
/// # Errors
///
/// Returns `HarnessError::Io` when the file cannot be read, otherwise the
/// errors of [`from_toml_str`].
pub fn from_path<P: AsRef<Path>>(target: P) -> HarnessResult<HarnessConfig> {
    let content = std::fs::read_to_string(target)?;
    from_toml_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HarnessError;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarnessConfig::new();
        assert_eq!(config.get_readers(), 3);
        assert_eq!(config.get_writers(), 2);
        assert_eq!(config.get_write_delta(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_configure_rejects_no_workers() {
        let result = HarnessConfig::configure(0, 0, ThinkTime::ZERO, ThinkTime::ZERO);
        assert_eq!(result, Err(ConfigurationError::NoWorkers));
    }

    #[test]
    fn test_configure_rejects_too_many_workers() {
        let result = HarnessConfig::configure(MAX_WORKERS, 1, ThinkTime::ZERO, ThinkTime::ZERO);
        assert_eq!(
            result,
            Err(ConfigurationError::TooManyWorkers {
                requested: MAX_WORKERS + 1,
                max: MAX_WORKERS,
            })
        );
    }

    #[test]
    fn test_configure_rejects_bad_ranges() {
        let inverted = HarnessConfig::configure(1, 1, ThinkTime::new(2.0, 1.0), ThinkTime::ZERO);
        assert!(matches!(
            inverted,
            Err(ConfigurationError::InvertedRange { field: "reader_think", .. })
        ));

        let negative = HarnessConfig::configure(1, 1, ThinkTime::ZERO, ThinkTime::new(-0.1, 1.0));
        assert!(matches!(
            negative,
            Err(ConfigurationError::InvalidDuration { field: "writer_think", .. })
        ));

        let nan = HarnessConfig::new().read_hold(ThinkTime::fixed(f64::NAN)).validate();
        assert!(matches!(
            nan,
            Err(ConfigurationError::InvalidDuration { field: "read_hold", .. })
        ));
    }

    #[test]
    fn test_think_time_sampling_stays_in_range() {
        let range = ThinkTime::from_millis(100, 300);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..1000 {
            let sampled = range.sample(&mut rng);
            assert!(sampled >= Duration::from_millis(100));
            assert!(sampled <= Duration::from_millis(300));
        }

        assert_eq!(ThinkTime::fixed(0.25).sample(&mut rng), Duration::from_millis(250));
        assert!(ThinkTime::ZERO.is_zero());
    }

    #[test]
    fn test_from_toml_str_overrides_defaults() {
        let config = from_toml_str(
            r#"
            readers = 8
            writers = 1
            seed = 42
            reader_think = { min_secs = 0.1, max_secs = 0.3 }
            write_hold = { min_secs = 0.5, max_secs = 1.0 }
            "#,
        )
        .unwrap();

        assert_eq!(config.get_readers(), 8);
        assert_eq!(config.get_writers(), 1);
        assert_eq!(config.get_seed(), Some(42));
        assert_eq!(config.get_reader_think(), ThinkTime::new(0.1, 0.3));
        assert_eq!(config.get_write_hold(), ThinkTime::new(0.5, 1.0));
        assert_eq!(config.get_writer_think(), HarnessConfig::new().get_writer_think());
    }

    #[test]
    fn test_from_toml_str_rejects_negative_counts() {
        let err = from_toml_str("readers = -1").unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Configuration(ConfigurationError::NegativeCount {
                field: "readers",
                value: -1,
            })
        ));
    }

    #[test]
    fn test_from_toml_str_rejects_malformed_input() {
        assert!(matches!(
            from_toml_str("readers = \"many\""),
            Err(HarnessError::Parse(_))
        ));
        assert!(matches!(
            from_toml_str("listeners = 3"),
            Err(HarnessError::Parse(_))
        ));
    }

    #[test]
    fn test_from_path_reports_missing_file() {
        assert!(matches!(
            from_path("/nonexistent/harness.toml"),
            Err(HarnessError::Io(_))
        ));
    }
}
