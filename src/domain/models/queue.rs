//! Work queue projections.
//!
//! Read-optimized views over current run state, recomputed on demand and
//! never independently stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::playbook::ExecutionMode;
use crate::domain::models::run::{DecisionSummary, PlaybookRun, RunStatus};

/// A run projected for display, with denormalized playbook fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkQueueItem {
    pub run_id: Uuid,
    pub playbook_id: Uuid,
    pub playbook_name: String,
    pub category: String,
    pub execution_mode: ExecutionMode,
    pub customer_id: String,
    pub status: RunStatus,
    pub confidence: f64,
    pub potential_value: f64,
    pub reason: String,
    pub decision_summary: DecisionSummary,
    pub created_at: DateTime<Utc>,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub failed_action_count: usize,
}

impl WorkQueueItem {
    /// Project a run together with its playbook's display fields.
    pub fn project(
        run: &PlaybookRun,
        playbook_name: impl Into<String>,
        category: impl Into<String>,
        execution_mode: ExecutionMode,
    ) -> Self {
        Self {
            run_id: run.id,
            playbook_id: run.playbook_id,
            playbook_name: playbook_name.into(),
            category: category.into(),
            execution_mode,
            customer_id: run.customer_id.clone(),
            status: run.status,
            confidence: run.confidence,
            potential_value: run.potential_value,
            reason: run.reason.clone(),
            decision_summary: run.decision_summary.clone(),
            created_at: run.created_at,
            snoozed_until: run.snoozed_until,
            failed_action_count: run
                .actions
                .iter()
                .filter(|a| a.status == crate::domain::models::run::ActionStatus::Failed)
                .count(),
        }
    }
}

/// Aggregate summary over the Pending view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingSummary {
    pub count: usize,
    /// Items whose potential value exceeds the configured threshold.
    pub high_value_count: usize,
    /// Items older than the configured staleness threshold.
    pub stale_count: usize,
    pub total_potential_value: f64,
    /// Age in seconds of the oldest pending item.
    pub oldest_age_secs: Option<i64>,
}

/// Aggregate summary over the Recently Acted view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentlyActedSummary {
    pub count: usize,
    pub approved: usize,
    pub dismissed: usize,
    pub snoozed: usize,
    /// Completed / (completed + failed) among runs acted on in the window.
    pub success_rate: f64,
}

/// Aggregate summary over the Failed view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailedSummary {
    pub count: usize,
    /// Total failed actions across listed runs.
    pub failed_action_count: usize,
    /// Age in seconds of the oldest unresolved failure.
    pub oldest_failure_age_secs: Option<i64>,
    pub total_value_affected: f64,
}

/// A materialized view plus its summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueView<S> {
    pub items: Vec<WorkQueueItem>,
    pub summary: S,
}

/// One queue mutation applied to a single run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum QueueAction {
    Approve,
    Dismiss,
    Snooze { hours: u32 },
    Escalate,
}

/// Per-item failure within a bulk operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkActionFailure {
    pub run_id: Uuid,
    pub reason: String,
}

/// Per-item partition returned by every bulk operation. Never
/// all-or-nothing: `succeeded.len() + failed.len()` equals the input size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkActionOutcome {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BulkActionFailure>,
}
