//! Latency statistics and run reports.

pub mod reporter;

pub use reporter::RunReport;

/// Summary statistics over latency samples, in nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatencyStats {
    samples: Vec<u64>,
}

impl LatencyStats {
    /// Takes ownership of the samples and sorts them once.
    #[must_use]
    pub fn from_samples(mut samples: Vec<u64>) -> Self {
        samples.sort_unstable();
        Self { samples }
    }

    /// Returns the number of samples.
    #[must_use]
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if no sample was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the minimum latency in nanoseconds.
    #[must_use]
    pub fn min(&self) -> Option<u64> {
        self.samples.first().copied()
    }

    /// Returns the maximum latency in nanoseconds.
    #[must_use]
    pub fn max(&self) -> Option<u64> {
        self.samples.last().copied()
    }

    /// Returns the average latency in nanoseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            let sum: u128 = self.samples.iter().map(|&sample| u128::from(sample)).sum();
            Some(sum as f64 / self.samples.len() as f64)
        }
    }

    /// Returns the median latency in nanoseconds.
    #[must_use]
    pub fn median(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }

        let mid = self.samples.len() / 2;
        if self.samples.len() % 2 == 0 {
            Some(self.samples[mid - 1] / 2 + self.samples[mid] / 2)
        } else {
            Some(self.samples[mid])
        }
    }

    /// Returns the p95 latency in nanoseconds.
    #[must_use]
    pub fn p95(&self) -> Option<u64> {
        self.percentile(0.95)
    }

    /// Returns the p99 latency in nanoseconds.
    #[must_use]
    pub fn p99(&self) -> Option<u64> {
        self.percentile(0.99)
    }

    /// Returns the latency at the given percentile (0.0 to 1.0).
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn percentile(&self, percentile: f64) -> Option<u64> {
        if self.samples.is_empty() || !(0.0..=1.0).contains(&percentile) {
            return None;
        }

        let rank = ((self.samples.len() as f64) * percentile).ceil() as usize;
        let index = rank.saturating_sub(1).min(self.samples.len() - 1);
        Some(self.samples[index])
    }
}
