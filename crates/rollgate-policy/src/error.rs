//! Error types for policy loading.

use thiserror::Error;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors that can occur while loading a policy or results file.
///
/// These are configuration errors: the evaluator itself never raises
/// for expected conditions like a missing metric — those become failed
/// rules with a reason.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("policy is not a YAML mapping: {0}")]
    NotAMapping(String),

    #[error("invalid policy YAML: {0}")]
    Yaml(String),

    #[error("results are not a JSON object: {0}")]
    NotAnObject(String),

    #[error("invalid results JSON: {0}")]
    Json(String),
}
