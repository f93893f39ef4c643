//! Domain errors for the Reclaim playbook engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A lifecycle transition was attempted from an unexpected source state.
    /// Benign under concurrent or duplicated requests; the run is unchanged.
    #[error("Invalid transition from {from} to {to}: {reason}")]
    Conflict { from: String, to: String, reason: String },

    #[error("Concurrency limit reached for playbook {playbook_id}: {active}/{max} active runs")]
    ConcurrencyLimitExceeded { playbook_id: Uuid, active: u32, max: u32 },

    #[error("External action failed ({code}): {message}")]
    ExternalAction { code: String, message: String, retryable: bool },

    #[error("Playbook not found: {0}")]
    PlaybookNotFound(Uuid),

    #[error("Run not found: {0}")]
    RunNotFound(Uuid),

    #[error("Action not found: {0}")]
    ActionNotFound(Uuid),

    #[error("No adapter registered for action type: {0}")]
    AdapterMissing(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Whether this error is the benign guarded-transition signal.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
