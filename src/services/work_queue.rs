//! Work queue views and queue mutations.
//!
//! Projects current run state into the three operator-facing views and
//! applies single and bulk queue actions through the lifecycle service.
//! Views are recomputed from the store on every call.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::domain::errors::EngineResult;
use crate::domain::models::config::QueueConfig;
use crate::domain::models::{
    BulkActionFailure, BulkActionOutcome, FailedSummary, PendingSummary, Playbook, PlaybookRun,
    QueueAction, QueueView, RecentlyActedSummary, RunStatus, WorkQueueItem,
};
use crate::domain::ports::{PlaybookRepository, RunFilter, RunRepository};
use crate::services::run_lifecycle::RunLifecycleService;

pub struct WorkQueueService {
    runs: Arc<dyn RunRepository>,
    playbooks: Arc<dyn PlaybookRepository>,
    lifecycle: Arc<RunLifecycleService>,
    config: QueueConfig,
}

impl WorkQueueService {
    pub fn new(
        runs: Arc<dyn RunRepository>,
        playbooks: Arc<dyn PlaybookRepository>,
        lifecycle: Arc<RunLifecycleService>,
        config: QueueConfig,
    ) -> Self {
        Self { runs, playbooks, lifecycle, config }
    }

    /// Runs awaiting human action. Escalated items sort ahead of the rest;
    /// within a status, higher potential value first.
    #[instrument(skip(self))]
    pub async fn pending_view(&self) -> EngineResult<QueueView<PendingSummary>> {
        let mut runs = self
            .runs
            .list(RunFilter { status: Some(RunStatus::Pending), ..RunFilter::default() })
            .await?;
        runs.extend(
            self.runs
                .list(RunFilter { status: Some(RunStatus::Escalated), ..RunFilter::default() })
                .await?,
        );

        let now = Utc::now();
        let stale_cutoff = now - Duration::hours(i64::from(self.config.stale_after_hours));

        let mut items = self.project(&runs).await?;
        items.sort_by(|a, b| {
            let rank = |s: RunStatus| u8::from(s != RunStatus::Escalated);
            rank(a.status)
                .cmp(&rank(b.status))
                .then(b.potential_value.total_cmp(&a.potential_value))
        });

        let summary = PendingSummary {
            count: items.len(),
            high_value_count: items
                .iter()
                .filter(|i| i.potential_value > self.config.high_value_threshold)
                .count(),
            stale_count: items.iter().filter(|i| i.created_at < stale_cutoff).count(),
            total_potential_value: items.iter().map(|i| i.potential_value).sum(),
            oldest_age_secs: items
                .iter()
                .map(|i| (now - i.created_at).num_seconds())
                .max(),
        };
        Ok(QueueView { items, summary })
    }

    /// Runs acted on within the trailing window, newest first.
    #[instrument(skip(self))]
    pub async fn recently_acted_view(&self) -> EngineResult<QueueView<RecentlyActedSummary>> {
        let since = Utc::now() - Duration::hours(i64::from(self.config.recent_window_hours));
        let runs: Vec<PlaybookRun> = self
            .runs
            .list_transitioned_since(since)
            .await?
            .into_iter()
            .filter(|r| r.status != RunStatus::Pending)
            .collect();

        let approved = runs.iter().filter(|r| r.approved_at.is_some()).count();
        let dismissed = runs.iter().filter(|r| r.status == RunStatus::Dismissed).count();
        let snoozed = runs.iter().filter(|r| r.status == RunStatus::Snoozed).count();
        let completed = runs.iter().filter(|r| r.status == RunStatus::Completed).count();
        let failed = runs.iter().filter(|r| r.status == RunStatus::Failed).count();
        let executed = completed + failed;

        let summary = RecentlyActedSummary {
            count: runs.len(),
            approved,
            dismissed,
            snoozed,
            success_rate: if executed == 0 {
                0.0
            } else {
                completed as f64 / executed as f64
            },
        };
        let items = self.project(&runs).await?;
        Ok(QueueView { items, summary })
    }

    /// Runs parked in Failed with unresolved action failures.
    #[instrument(skip(self))]
    pub async fn failed_view(&self) -> EngineResult<QueueView<FailedSummary>> {
        let runs = self.runs.list_failed().await?;
        let now = Utc::now();
        let items = self.project(&runs).await?;

        let summary = FailedSummary {
            count: items.len(),
            failed_action_count: items.iter().map(|i| i.failed_action_count).sum(),
            oldest_failure_age_secs: runs
                .iter()
                .map(|r| (now - r.updated_at).num_seconds())
                .max(),
            total_value_affected: items.iter().map(|i| i.potential_value).sum(),
        };
        Ok(QueueView { items, summary })
    }

    /// Apply one queue action to one run.
    pub async fn apply_action(&self, run_id: Uuid, action: QueueAction) -> EngineResult<PlaybookRun> {
        match action {
            QueueAction::Approve => self.lifecycle.approve(run_id).await,
            QueueAction::Dismiss => self.lifecycle.dismiss(run_id).await,
            QueueAction::Snooze { hours } => self.lifecycle.snooze(run_id, hours).await,
            QueueAction::Escalate => self.lifecycle.escalate(run_id).await,
        }
    }

    /// Apply one action to many runs independently. Always returns a
    /// per-item partition; one run's rejection never rolls back another.
    #[instrument(skip(self), fields(count = run_ids.len()))]
    pub async fn bulk_action(
        &self,
        run_ids: &[Uuid],
        action: QueueAction,
    ) -> EngineResult<BulkActionOutcome> {
        let mut outcome = BulkActionOutcome::default();
        for &run_id in run_ids {
            match self.apply_action(run_id, action).await {
                Ok(_) => outcome.succeeded.push(run_id),
                Err(e) => {
                    warn!(run_id = %run_id, error = %e, "bulk action item rejected");
                    outcome.failed.push(BulkActionFailure { run_id, reason: e.to_string() });
                }
            }
        }
        Ok(outcome)
    }

    /// Join runs with their playbook display fields. Runs whose playbook
    /// row is gone are skipped rather than failing the whole view.
    async fn project(&self, runs: &[PlaybookRun]) -> EngineResult<Vec<WorkQueueItem>> {
        let mut cache: HashMap<Uuid, Playbook> = HashMap::new();
        let mut items = Vec::with_capacity(runs.len());
        for run in runs {
            if !cache.contains_key(&run.playbook_id) {
                match self.playbooks.get(run.playbook_id).await? {
                    Some(p) => {
                        cache.insert(run.playbook_id, p);
                    }
                    None => {
                        warn!(run_id = %run.id, playbook_id = %run.playbook_id, "playbook missing for run");
                        continue;
                    }
                }
            }
            let playbook = &cache[&run.playbook_id];
            items.push(WorkQueueItem::project(
                run,
                playbook.name.clone(),
                playbook.category.clone(),
                playbook.execution_mode,
            ));
        }
        Ok(items)
    }
}
