use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::EngineResult;
use crate::domain::models::ConflictLogEntry;

/// Append-only audit trail of suppressed playbooks.
#[async_trait]
pub trait ConflictLogRepository: Send + Sync {
    async fn append(&self, entry: &ConflictLogEntry) -> EngineResult<()>;

    async fn list_for_customer(&self, customer_id: &str) -> EngineResult<Vec<ConflictLogEntry>>;

    async fn list_for_playbook(&self, playbook_id: Uuid) -> EngineResult<Vec<ConflictLogEntry>>;
}
