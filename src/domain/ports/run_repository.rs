use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::EngineResult;
use crate::domain::models::{PlaybookRun, RunAction, RunStatus};

/// Filters for querying runs.
#[derive(Default, Debug, Clone)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub playbook_id: Option<Uuid>,
    pub customer_id: Option<String>,
    pub limit: Option<i64>,
}

/// Repository port for run persistence.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Insert a new run together with its action rows.
    async fn create(&self, run: &PlaybookRun) -> EngineResult<()>;

    /// Get a run (with actions) by id.
    async fn get(&self, id: Uuid) -> EngineResult<Option<PlaybookRun>>;

    /// Persist a run's current state, guarded on the expected source
    /// status. Fails with a Conflict error when another writer moved the
    /// run first; the stored row is left untouched.
    async fn update_guarded(&self, run: &PlaybookRun, expected: RunStatus) -> EngineResult<()>;

    /// Persist one action's state.
    async fn update_action(&self, action: &RunAction) -> EngineResult<()>;

    /// List runs with optional filters, newest first.
    async fn list(&self, filter: RunFilter) -> EngineResult<Vec<PlaybookRun>>;

    /// Runs whose status changed at or after the given instant.
    async fn list_transitioned_since(&self, since: DateTime<Utc>) -> EngineResult<Vec<PlaybookRun>>;

    /// Runs with unresolved failed actions.
    async fn list_failed(&self) -> EngineResult<Vec<PlaybookRun>>;

    /// Snoozed runs whose `snoozed_until` has passed.
    async fn list_snooze_expired(&self, now: DateTime<Utc>) -> EngineResult<Vec<PlaybookRun>>;

    /// Count of runs currently holding a concurrency slot for a playbook.
    async fn count_open_for_playbook(&self, playbook_id: Uuid) -> EngineResult<u32>;
}
