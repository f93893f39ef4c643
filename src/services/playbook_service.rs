//! Playbook definition management.
//!
//! Validated create/update, status transitions, duplication, and the
//! "why didn't this trigger" diagnostic over a single playbook.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{
    CustomerSnapshot, Playbook, PlaybookRun, PlaybookStatus, Signal, TriggerEvaluation,
};
use crate::domain::ports::{PlaybookFilter, PlaybookRepository, RunFilter, RunRepository};
use crate::services::trigger_evaluator::TriggerEvaluator;

pub struct PlaybookService {
    playbooks: Arc<dyn PlaybookRepository>,
    runs: Arc<dyn RunRepository>,
    evaluator: Arc<TriggerEvaluator>,
}

impl PlaybookService {
    pub fn new(
        playbooks: Arc<dyn PlaybookRepository>,
        runs: Arc<dyn RunRepository>,
        evaluator: Arc<TriggerEvaluator>,
    ) -> Self {
        Self { playbooks, runs, evaluator }
    }

    #[instrument(skip_all, fields(name = %playbook.name))]
    pub async fn create(&self, playbook: Playbook) -> EngineResult<Playbook> {
        playbook.validate()?;
        self.playbooks.create(&playbook).await?;
        info!(playbook_id = %playbook.id, "playbook created");
        Ok(playbook)
    }

    pub async fn get(&self, id: Uuid) -> EngineResult<Playbook> {
        self.playbooks
            .get(id)
            .await?
            .ok_or(EngineError::PlaybookNotFound(id))
    }

    /// Update a playbook definition in place. The stored status wins; use
    /// the explicit transition methods to change it.
    pub async fn update(&self, mut playbook: Playbook) -> EngineResult<Playbook> {
        playbook.validate()?;
        let current = self.get(playbook.id).await?;
        playbook.status = current.status;
        playbook.updated_at = chrono::Utc::now();
        self.playbooks.update(&playbook).await?;
        Ok(playbook)
    }

    pub async fn activate(&self, id: Uuid) -> EngineResult<Playbook> {
        self.transition(id, PlaybookStatus::Active).await
    }

    pub async fn pause(&self, id: Uuid) -> EngineResult<Playbook> {
        self.transition(id, PlaybookStatus::Paused).await
    }

    pub async fn archive(&self, id: Uuid) -> EngineResult<Playbook> {
        self.transition(id, PlaybookStatus::Archived).await
    }

    /// Copy a playbook into a fresh Draft with a "(copy)" name suffix.
    pub async fn duplicate(&self, id: Uuid) -> EngineResult<Playbook> {
        let source = self.get(id).await?;
        let copy = source.duplicate();
        self.playbooks.create(&copy).await?;
        info!(source = %id, copy = %copy.id, "playbook duplicated");
        Ok(copy)
    }

    pub async fn list(&self, filter: PlaybookFilter) -> EngineResult<Vec<Playbook>> {
        self.playbooks.list(filter).await
    }

    pub async fn list_runs(&self, playbook_id: Uuid) -> EngineResult<Vec<PlaybookRun>> {
        // 404 over an empty list for an unknown playbook.
        self.get(playbook_id).await?;
        self.runs
            .list(RunFilter { playbook_id: Some(playbook_id), ..RunFilter::default() })
            .await
    }

    /// Dry-run one playbook against a signal without creating anything.
    /// Active-only and trigger-type gating still apply, so a paused
    /// playbook explains as non-participating.
    pub async fn explain(
        &self,
        playbook_id: Uuid,
        customer: &CustomerSnapshot,
        signal: &Signal,
    ) -> EngineResult<Option<TriggerEvaluation>> {
        let playbook = self.get(playbook_id).await?;
        self.evaluator.evaluate(&playbook, customer, signal).await
    }

    async fn transition(&self, id: Uuid, target: PlaybookStatus) -> EngineResult<Playbook> {
        let mut playbook = self.get(id).await?;
        if !playbook.status.can_transition_to(target) {
            return Err(EngineError::Conflict {
                from: playbook.status.as_str().to_string(),
                to: target.as_str().to_string(),
                reason: "status transition not allowed".to_string(),
            });
        }
        playbook.status = target;
        playbook.updated_at = chrono::Utc::now();
        self.playbooks.update(&playbook).await?;
        info!(playbook_id = %id, status = target.as_str(), "playbook status changed");
        Ok(playbook)
    }
}
