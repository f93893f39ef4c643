use async_trait::async_trait;
use serde_json::Value;

/// Successful adapter invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterResponse {
    /// Identifier assigned by the external system, when it provides one.
    pub external_id: Option<String>,
    /// Raw response payload for audit.
    pub response: Value,
}

impl AdapterResponse {
    pub fn new(external_id: Option<String>, response: Value) -> Self {
        Self { external_id, response }
    }

    pub fn empty() -> Self {
        Self { external_id: None, response: Value::Null }
    }
}

/// Failed adapter invocation, classified retryable or terminal by the
/// adapter itself.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl AdapterError {
    pub fn retryable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into(), retryable: true }
    }

    pub fn terminal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into(), retryable: false }
    }

    pub fn unsupported(operation: &str) -> Self {
        Self::terminal("unsupported", format!("{operation} is not supported by this adapter"))
    }
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Uniform contract for outbound action delivery. One adapter per action
/// type; the engine never looks inside the config it passes through.
#[async_trait]
pub trait ActionAdapter: Send + Sync {
    /// Execute the action described by `config`.
    async fn execute(&self, config: &Value) -> Result<AdapterResponse, AdapterError>;

    /// Whether this adapter can compensate a previously executed action.
    fn supports_undo(&self) -> bool {
        false
    }

    /// Invoke the compensating action for a prior execution.
    async fn undo(
        &self,
        _config: &Value,
        _external_id: Option<&str>,
    ) -> Result<AdapterResponse, AdapterError> {
        Err(AdapterError::unsupported("undo"))
    }
}
