//! Error types for the canary controller.

use thiserror::Error;

/// Result type alias for canary operations.
pub type CanaryResult<T> = Result<T, CanaryError>;

/// Errors a tick can surface. The loop logs these and keeps the
/// previous output; it never stops on a failed tick.
#[derive(Debug, Error)]
pub enum CanaryError {
    #[error("failed to read metrics file {path}: {source}")]
    MetricsRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics file missing or invalid fail_rate: {0}")]
    MetricsParse(String),

    #[error("observed fail rate {0} outside [0, 1]")]
    FailRateRange(f64),

    #[error("failed to persist controller state: {0}")]
    StateWrite(std::io::Error),

    #[error("failed to write env file: {0}")]
    EnvWrite(std::io::Error),
}
