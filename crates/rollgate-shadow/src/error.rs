//! Error types for shadow execution.

use thiserror::Error;

/// Result type alias for shadow operations.
pub type ShadowResult<T> = Result<T, ShadowError>;

/// Errors during a shadow comparison run.
///
/// `Timeout` is transient: the caller retries the batch; it is never
/// silently treated as success.
#[derive(Debug, Error)]
pub enum ShadowError {
    #[error("shadow ratio {0} outside [0, 1]")]
    InvalidRatio(f64),

    #[error("backend timed out on arm {arm} after {timeout_ms}ms")]
    Timeout { arm: String, timeout_ms: u64 },

    #[error("backend failed on arm {arm}: {detail}")]
    Backend { arm: String, detail: String },

    #[error("audit log I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("run record serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}
