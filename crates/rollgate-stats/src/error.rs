//! Error types for statistical comparison.

use thiserror::Error;

/// Result type alias for statistical operations.
pub type StatsResult<T> = Result<T, StatsError>;

/// Errors for degenerate statistical inputs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("empty sample: {0}")]
    EmptySample(&'static str),

    #[error("both samples have zero variance; t-statistic is undefined")]
    ZeroVariance,

    #[error("rate requires at least one trial")]
    NoTrials,

    #[error("failures ({failures}) exceed trials ({trials})")]
    FailuresExceedTrials { failures: u64, trials: u64 },
}
