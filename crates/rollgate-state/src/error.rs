//! Error types for the RollGate decision store.

use thiserror::Error;

/// Result type alias for decision store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during decision store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session {id}: phase cannot move from {from:?} to {to:?}")]
    PhaseRegression {
        id: String,
        from: crate::types::SessionPhase,
        to: crate::types::SessionPhase,
    },

    #[error("session {id}: decision already set and differs from the new one")]
    DecisionConflict { id: String },
}
