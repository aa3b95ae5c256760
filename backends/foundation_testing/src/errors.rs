//! Harness error types.

use thiserror::Error;

use crate::config::ConfigurationError;

/// Result type returned by harness operations.
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// Errors surfaced by [`crate::WorkerHarness`] and configuration loading.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The configuration failed validation.
    #[error("invalid harness configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// `start`, `run` or `configure` called while workers are running.
    #[error("harness is already running, stop it first")]
    AlreadyRunning,

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker thread {name}: {source}")]
    Spawn {
        /// Thread name, `reader-N` or `writer-N`.
        name: String,
        /// Error returned by the OS.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file is not valid TOML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
