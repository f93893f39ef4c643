use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::EngineResult;
use crate::domain::models::{Playbook, PlaybookStatus};

/// Filters for querying playbooks.
#[derive(Default, Debug, Clone)]
pub struct PlaybookFilter {
    pub status: Option<PlaybookStatus>,
    pub trigger_type: Option<String>,
    pub category: Option<String>,
}

/// Repository port for playbook persistence.
#[async_trait]
pub trait PlaybookRepository: Send + Sync {
    /// Insert a new playbook.
    async fn create(&self, playbook: &Playbook) -> EngineResult<()>;

    /// Get a playbook by id.
    async fn get(&self, id: Uuid) -> EngineResult<Option<Playbook>>;

    /// Update an existing playbook.
    async fn update(&self, playbook: &Playbook) -> EngineResult<()>;

    /// List playbooks with optional filters.
    async fn list(&self, filter: PlaybookFilter) -> EngineResult<Vec<Playbook>>;

    /// Active playbooks declaring interest in the given signal type.
    async fn list_active_for_trigger(&self, trigger_type: &str) -> EngineResult<Vec<Playbook>>;
}
