//! Run lifecycle management.
//!
//! Owns PlaybookRun state: creation from a winning evaluation and every
//! guarded human-driven transition. Guards run twice: once on the domain
//! model's transition table, and once at the store via an expected-source
//! status so concurrent or duplicated requests are safe no-ops past the
//! first success.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::evaluation::TriggerEvaluation;
use crate::domain::models::{Playbook, PlaybookRun, RunStatus, Signal};
use crate::domain::ports::RunRepository;

pub struct RunLifecycleService {
    runs: Arc<dyn RunRepository>,
    /// Attempt cap stamped onto each run action at creation.
    max_attempts: u32,
}

impl RunLifecycleService {
    pub fn new(runs: Arc<dyn RunRepository>, max_attempts: u32) -> Self {
        Self { runs, max_attempts }
    }

    /// Create a run from a winning evaluation. The caller has already
    /// claimed the (customer, playbook) pair; this only materializes the
    /// run. AutoExecute playbooks start in Executing.
    #[instrument(skip_all, fields(playbook = %playbook.name, customer = %signal.customer_id))]
    pub async fn create_from_evaluation(
        &self,
        playbook: &Playbook,
        evaluation: &TriggerEvaluation,
        signal: &Signal,
    ) -> EngineResult<PlaybookRun> {
        let run = PlaybookRun::from_playbook(
            playbook,
            signal.customer_id.clone(),
            signal.confidence,
            signal.potential_value(),
            format!("{} triggered by {}", playbook.name, signal.signal_type),
            evaluation.decision_summary.clone(),
            self.max_attempts,
        );
        self.runs.create(&run).await?;
        info!(run_id = %run.id, status = run.status.as_str(), "run created");
        Ok(run)
    }

    pub async fn get(&self, run_id: Uuid) -> EngineResult<PlaybookRun> {
        self.runs
            .get(run_id)
            .await?
            .ok_or(EngineError::RunNotFound(run_id))
    }

    pub async fn approve(&self, run_id: Uuid) -> EngineResult<PlaybookRun> {
        self.transition(run_id, RunStatus::Approved).await
    }

    pub async fn dismiss(&self, run_id: Uuid) -> EngineResult<PlaybookRun> {
        self.transition(run_id, RunStatus::Dismissed).await
    }

    pub async fn escalate(&self, run_id: Uuid) -> EngineResult<PlaybookRun> {
        self.transition(run_id, RunStatus::Escalated).await
    }

    /// Move a Failed-origin dismissal back to Failed for another look.
    pub async fn undismiss(&self, run_id: Uuid) -> EngineResult<PlaybookRun> {
        self.transition(run_id, RunStatus::Failed).await
    }

    /// Mark an Approved run as Executing. Used by the executor.
    pub async fn start_execution(&self, run_id: Uuid) -> EngineResult<PlaybookRun> {
        self.transition(run_id, RunStatus::Executing).await
    }

    pub async fn snooze(&self, run_id: Uuid, hours: u32) -> EngineResult<PlaybookRun> {
        let mut run = self.get(run_id).await?;
        let expected = run.status;
        run.snooze_until(Utc::now() + Duration::hours(i64::from(hours)))?;
        self.runs.update_guarded(&run, expected).await?;
        info!(run_id = %run.id, until = ?run.snoozed_until, "run snoozed");
        Ok(run)
    }

    /// Return expired Snoozed runs to Pending. Called by the scheduler;
    /// individual conflicts (a concurrent writer got there first) are
    /// skipped, not fatal.
    pub async fn requeue_expired_snoozes(&self, now: DateTime<Utc>) -> EngineResult<usize> {
        let expired = self.runs.list_snooze_expired(now).await?;
        let mut requeued = 0;
        for mut run in expired {
            let expected = run.status;
            if run.transition_to(RunStatus::Pending).is_err() {
                continue;
            }
            match self.runs.update_guarded(&run, expected).await {
                Ok(()) => requeued += 1,
                Err(e) if e.is_conflict() => continue,
                Err(e) => return Err(e),
            }
        }
        if requeued > 0 {
            info!(count = requeued, "requeued expired snoozes");
        }
        Ok(requeued)
    }

    async fn transition(&self, run_id: Uuid, to: RunStatus) -> EngineResult<PlaybookRun> {
        let mut run = self.get(run_id).await?;
        let expected = run.status;
        run.transition_to(to)?;
        self.runs.update_guarded(&run, expected).await?;
        info!(run_id = %run.id, from = expected.as_str(), to = to.as_str(), "run transitioned");
        Ok(run)
    }
}
