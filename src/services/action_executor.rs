//! Action execution with retry.
//!
//! Executes a run's ordered action list against registered adapters,
//! tracking per-action attempts and failure classification. Retryable
//! failures back off exponentially up to the configured attempt cap;
//! terminal failures stop immediately and park the run in Failed for
//! human retry, dismissal, or escalation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::adapters::actions::AdapterRegistry;
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::config::ExecutionConfig;
use crate::domain::models::{ActionStatus, PlaybookRun, RunAction, RunStatus};
use crate::domain::ports::{ActionAdapter, RunRepository};

/// How a finished execution pass left the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
}

pub struct ActionExecutor {
    runs: Arc<dyn RunRepository>,
    adapters: Arc<AdapterRegistry>,
    config: ExecutionConfig,
}

impl ActionExecutor {
    pub fn new(
        runs: Arc<dyn RunRepository>,
        adapters: Arc<AdapterRegistry>,
        config: ExecutionConfig,
    ) -> Self {
        Self { runs, adapters, config }
    }

    /// Execute every pending action of a run. Accepts runs in Approved
    /// (transitioning them to Executing) or already Executing
    /// (the AutoExecute creation path).
    #[instrument(skip(self), fields(run_id = %run_id))]
    pub async fn execute(&self, run_id: Uuid) -> EngineResult<RunOutcome> {
        let mut run = self.load(run_id).await?;
        if run.status == RunStatus::Approved {
            let expected = run.status;
            run.transition_to(RunStatus::Executing)?;
            self.runs.update_guarded(&run, expected).await?;
        } else if run.status != RunStatus::Executing {
            return Err(EngineError::Conflict {
                from: run.status.as_str().to_string(),
                to: RunStatus::Executing.as_str().to_string(),
                reason: "run is not ready to execute".to_string(),
            });
        }

        let mut ordered: Vec<Uuid> = {
            let mut actions: Vec<&RunAction> = run.actions.iter().collect();
            actions.sort_by_key(|a| a.order_index);
            actions.iter().map(|a| a.id).collect()
        };
        for action_id in ordered.drain(..) {
            let action = run
                .action(action_id)
                .ok_or(EngineError::ActionNotFound(action_id))?;
            if action.status == ActionStatus::Succeeded {
                continue;
            }
            self.attempt_with_backoff(&mut run, action_id).await?;
            let action = run
                .action(action_id)
                .ok_or(EngineError::ActionNotFound(action_id))?;
            if action.status != ActionStatus::Succeeded {
                // Ordered execution: later actions stay Pending until a
                // retry pass clears this one.
                break;
            }
        }

        self.finalize(run).await
    }

    /// Re-attempt a single failed action, then re-derive the run state.
    /// Manual retries grant one fresh attempt past the automatic cap;
    /// only Failed runs can be retried.
    pub async fn retry_one(&self, run_id: Uuid, action_id: Uuid) -> EngineResult<RunOutcome> {
        let mut run = self.resume_failed(run_id).await?;
        let action = run
            .action(action_id)
            .ok_or(EngineError::ActionNotFound(action_id))?;
        if action.status != ActionStatus::Failed {
            return Err(EngineError::Conflict {
                from: action.status.as_str().to_string(),
                to: ActionStatus::Failed.as_str().to_string(),
                reason: "only failed actions can be retried".to_string(),
            });
        }
        self.attempt_once(&mut run, action_id).await?;
        self.finalize(run).await
    }

    /// Re-attempt every failed action and resume the unexecuted tail left
    /// behind when an earlier failure stopped the ordered pass. Stops
    /// again at the first action that does not succeed.
    pub async fn retry_all(&self, run_id: Uuid) -> EngineResult<RunOutcome> {
        let mut run = self.resume_failed(run_id).await?;
        let remaining: Vec<Uuid> = {
            let mut actions: Vec<&RunAction> = run
                .actions
                .iter()
                .filter(|a| a.status != ActionStatus::Succeeded)
                .collect();
            actions.sort_by_key(|a| a.order_index);
            actions.iter().map(|a| a.id).collect()
        };
        for action_id in remaining {
            self.attempt_once(&mut run, action_id).await?;
            let action = run
                .action(action_id)
                .ok_or(EngineError::ActionNotFound(action_id))?;
            if action.status != ActionStatus::Succeeded {
                break;
            }
        }
        self.finalize(run).await
    }

    /// Invoke compensating actions for a run's succeeded actions, in
    /// reverse order. Rejected up front if any succeeded action's adapter
    /// has no compensation, so undo is never left half-applied by an
    /// unsupported action type.
    pub async fn undo(&self, run_id: Uuid) -> EngineResult<PlaybookRun> {
        let mut run = self.load(run_id).await?;
        let mut succeeded: Vec<&RunAction> = run
            .actions
            .iter()
            .filter(|a| a.status == ActionStatus::Succeeded)
            .collect();
        succeeded.sort_by_key(|a| std::cmp::Reverse(a.order_index));

        for action in &succeeded {
            let adapter = self.adapter_for(action)?;
            if !adapter.supports_undo() {
                return Err(EngineError::ExternalAction {
                    code: "undo_unsupported".to_string(),
                    message: format!(
                        "action type {} does not support undo",
                        action.action_type.as_str()
                    ),
                    retryable: false,
                });
            }
        }

        for action in succeeded {
            let adapter = self.adapter_for(action)?;
            adapter
                .undo(&action.config, action.external_id.as_deref())
                .await
                .map_err(|e| EngineError::ExternalAction {
                    code: e.code,
                    message: e.message,
                    retryable: e.retryable,
                })?;
            info!(run_id = %run.id, action_id = %action.id, "action compensated");
        }

        let expected = run.status;
        run.outcome = Some("undone".to_string());
        self.runs.update_guarded(&run, expected).await?;
        Ok(run)
    }

    async fn load(&self, run_id: Uuid) -> EngineResult<PlaybookRun> {
        self.runs
            .get(run_id)
            .await?
            .ok_or(EngineError::RunNotFound(run_id))
    }

    /// Move a Failed run back to Executing for a retry pass.
    async fn resume_failed(&self, run_id: Uuid) -> EngineResult<PlaybookRun> {
        let mut run = self.load(run_id).await?;
        let expected = run.status;
        run.transition_to(RunStatus::Executing)?;
        self.runs.update_guarded(&run, expected).await?;
        Ok(run)
    }

    fn adapter_for(&self, action: &RunAction) -> EngineResult<Arc<dyn ActionAdapter>> {
        self.adapters
            .get(action.action_type)
            .ok_or_else(|| EngineError::AdapterMissing(action.action_type.as_str().to_string()))
    }

    /// Attempt an action repeatedly while failures stay retryable and the
    /// attempt cap allows, backing off exponentially between attempts.
    async fn attempt_with_backoff(&self, run: &mut PlaybookRun, action_id: Uuid) -> EngineResult<()> {
        loop {
            self.attempt_once(run, action_id).await?;
            let action = run
                .action(action_id)
                .ok_or(EngineError::ActionNotFound(action_id))?;
            if action.status == ActionStatus::Succeeded || !action.can_auto_retry() {
                return Ok(());
            }
            let backoff = self.backoff_for(action.attempt_count);
            warn!(
                action_id = %action_id,
                attempt = action.attempt_count,
                backoff_ms = backoff.as_millis() as u64,
                "retryable failure, backing off"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    /// One adapter invocation, persisted whatever the result.
    async fn attempt_once(&self, run: &mut PlaybookRun, action_id: Uuid) -> EngineResult<()> {
        let adapter = {
            let action = run
                .action(action_id)
                .ok_or(EngineError::ActionNotFound(action_id))?;
            self.adapter_for(action)?
        };
        let action = run
            .action_mut(action_id)
            .ok_or(EngineError::ActionNotFound(action_id))?;
        action.attempt_count += 1;

        match adapter.execute(&action.config).await {
            Ok(response) => {
                action.record_success(response.external_id);
                info!(action_id = %action_id, "action succeeded");
            }
            Err(e) => {
                warn!(action_id = %action_id, code = %e.code, retryable = e.retryable, "action failed");
                action.record_failure(e.code, e.message, e.retryable);
            }
        }
        let snapshot = action.clone();
        self.runs.update_action(&snapshot).await?;
        Ok(())
    }

    /// Derive the run's final state from its actions and persist it.
    async fn finalize(&self, mut run: PlaybookRun) -> EngineResult<RunOutcome> {
        let expected = run.status;
        if run.all_actions_succeeded() {
            run.transition_to(RunStatus::Completed)?;
            run.outcome = Some("completed".to_string());
            self.runs.update_guarded(&run, expected).await?;
            info!(run_id = %run.id, "run completed");
            Ok(RunOutcome::Completed)
        } else {
            run.transition_to(RunStatus::Failed)?;
            run.outcome = Some("failed".to_string());
            self.runs.update_guarded(&run, expected).await?;
            warn!(run_id = %run.id, "run failed");
            Ok(RunOutcome::Failed)
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let ms = self
            .config
            .initial_backoff_ms
            .saturating_mul(1_u64 << shift)
            .min(self.config.max_backoff_ms);
        Duration::from_millis(ms)
    }
}
