//! Playbook run domain model.
//!
//! A run is one instantiated, tracked attempt to execute a playbook for a
//! specific customer. Runs are created only by a winning trigger evaluation
//! and are never deleted, only transitioned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::playbook::{ActionType, ExecutionMode, Playbook};

/// Lifecycle status of a playbook run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Awaiting human action in the work queue.
    Pending,
    /// Approved by a human, ready to execute.
    Approved,
    /// Actions are being executed.
    Executing,
    /// Every action succeeded.
    Completed,
    /// At least one action failed terminally.
    Failed,
    /// Closed by a human without executing.
    Dismissed,
    /// Hidden from the queue until `snoozed_until`.
    Snoozed,
    /// Flagged for priority human attention.
    Escalated,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Dismissed => "dismissed",
            Self::Snoozed => "snoozed",
            Self::Escalated => "escalated",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "executing" => Some(Self::Executing),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "dismissed" => Some(Self::Dismissed),
            "snoozed" => Some(Self::Snoozed),
            "escalated" => Some(Self::Escalated),
            _ => None,
        }
    }

    /// Valid transitions from this status.
    ///
    /// `Dismissed -> Failed` is the undismiss path and is additionally
    /// guarded by the run's `dismissed_from` bookkeeping.
    pub fn valid_transitions(&self) -> Vec<RunStatus> {
        match self {
            Self::Pending => vec![Self::Approved, Self::Dismissed, Self::Snoozed, Self::Escalated],
            Self::Approved => vec![Self::Executing],
            Self::Executing => vec![Self::Completed, Self::Failed],
            Self::Failed => vec![Self::Executing, Self::Dismissed],
            Self::Dismissed => vec![Self::Failed],
            Self::Snoozed => vec![Self::Pending],
            Self::Escalated => vec![Self::Approved, Self::Dismissed],
            Self::Completed => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }

    /// Whether this run holds a concurrency slot for its playbook.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved | Self::Executing | Self::Escalated)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Status of one action within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Succeeded,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One tracked action within a run, snapshotted from the playbook's action
/// list at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAction {
    pub id: Uuid,
    pub run_id: Uuid,
    pub action_type: ActionType,
    pub order_index: u32,
    pub config: Value,
    pub status: ActionStatus,
    pub attempt_count: u32,
    pub max_attempts: u32,
    /// Identifier returned by the external system on success.
    pub external_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    /// Whether the last failure was classified retryable by the adapter.
    pub retryable: bool,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl RunAction {
    pub fn record_success(&mut self, external_id: Option<String>) {
        self.status = ActionStatus::Succeeded;
        self.external_id = external_id;
        self.error_code = None;
        self.error_message = None;
        self.retryable = true;
        self.last_attempt_at = Some(Utc::now());
    }

    pub fn record_failure(&mut self, code: impl Into<String>, message: impl Into<String>, retryable: bool) {
        self.status = ActionStatus::Failed;
        self.error_code = Some(code.into());
        self.error_message = Some(message.into());
        self.retryable = retryable;
        self.last_attempt_at = Some(Utc::now());
    }

    /// Whether automatic execution may attempt this action again.
    pub fn can_auto_retry(&self) -> bool {
        self.status == ActionStatus::Failed && self.retryable && self.attempt_count < self.max_attempts
    }

    /// Failed with no further automatic retries available.
    pub fn is_terminally_failed(&self) -> bool {
        self.status == ActionStatus::Failed && !self.can_auto_retry()
    }
}

/// Evidence supporting a decision, one field at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceField {
    pub field: String,
    pub value: Value,
}

/// The structured explanation attached to every evaluated run, supporting
/// the "why did (or didn't) this trigger" diagnostic view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub trigger: String,
    pub why_now: String,
    pub why_this_playbook: String,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<EvidenceField>,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    pub evaluated_at: Option<DateTime<Utc>>,
}

/// One instantiated, tracked attempt to execute a playbook for a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookRun {
    pub id: Uuid,
    pub playbook_id: Uuid,
    pub customer_id: String,
    pub status: RunStatus,
    pub outcome: Option<String>,
    pub confidence: f64,
    pub potential_value: f64,
    /// Short human-readable reason this run exists.
    pub reason: String,
    pub decision_summary: DecisionSummary,
    pub actions: Vec<RunAction>,
    /// Status held immediately before dismissal; gates undismiss.
    pub dismissed_from: Option<RunStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub snoozed_until: Option<DateTime<Utc>>,
}

impl PlaybookRun {
    /// Build a run from a winning evaluation's playbook. AutoExecute
    /// playbooks skip Pending/Approved and start in Executing.
    pub fn from_playbook(
        playbook: &Playbook,
        customer_id: impl Into<String>,
        confidence: f64,
        potential_value: f64,
        reason: impl Into<String>,
        decision_summary: DecisionSummary,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let status = match playbook.execution_mode {
            ExecutionMode::AutoExecute => RunStatus::Executing,
            ExecutionMode::RequireApproval => RunStatus::Pending,
        };
        let actions = playbook
            .ordered_actions()
            .into_iter()
            .map(|a| RunAction {
                id: Uuid::new_v4(),
                run_id: id,
                action_type: a.action_type,
                order_index: a.order_index,
                config: a.config.clone(),
                status: ActionStatus::Pending,
                attempt_count: 0,
                max_attempts,
                external_id: None,
                error_code: None,
                error_message: None,
                retryable: true,
                last_attempt_at: None,
            })
            .collect();
        Self {
            id,
            playbook_id: playbook.id,
            customer_id: customer_id.into(),
            status,
            outcome: None,
            confidence,
            potential_value,
            reason: reason.into(),
            decision_summary,
            actions,
            dismissed_from: None,
            created_at: now,
            updated_at: now,
            approved_at: None,
            completed_at: None,
            snoozed_until: None,
        }
    }

    pub fn can_transition_to(&self, new_status: RunStatus) -> bool {
        if self.status == RunStatus::Dismissed && new_status == RunStatus::Failed {
            // Undismiss only applies to Failed-origin dismissals.
            return self.dismissed_from == Some(RunStatus::Failed);
        }
        self.status.can_transition_to(new_status)
    }

    /// Guarded transition. Fails with a Conflict error and leaves the run
    /// unchanged when the requested edge is not in the allowed table.
    pub fn transition_to(&mut self, new_status: RunStatus) -> EngineResult<()> {
        if !self.can_transition_to(new_status) {
            return Err(EngineError::Conflict {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason: "transition not allowed from current state".to_string(),
            });
        }

        if new_status == RunStatus::Dismissed {
            self.dismissed_from = Some(self.status);
        }
        if self.status == RunStatus::Snoozed {
            self.snoozed_until = None;
        }

        self.status = new_status;
        self.updated_at = Utc::now();

        match new_status {
            RunStatus::Approved => self.approved_at = Some(Utc::now()),
            RunStatus::Completed => self.completed_at = Some(Utc::now()),
            _ => {}
        }
        Ok(())
    }

    /// Snooze until the given time. Only valid from Pending.
    pub fn snooze_until(&mut self, until: DateTime<Utc>) -> EngineResult<()> {
        self.transition_to(RunStatus::Snoozed)?;
        self.snoozed_until = Some(until);
        Ok(())
    }

    /// Whether a snoozed run is due to re-enter the queue.
    pub fn snooze_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == RunStatus::Snoozed
            && self.snoozed_until.is_some_and(|until| until <= now)
    }

    pub fn action(&self, action_id: Uuid) -> Option<&RunAction> {
        self.actions.iter().find(|a| a.id == action_id)
    }

    pub fn action_mut(&mut self, action_id: Uuid) -> Option<&mut RunAction> {
        self.actions.iter_mut().find(|a| a.id == action_id)
    }

    pub fn all_actions_succeeded(&self) -> bool {
        self.actions.iter().all(|a| a.status == ActionStatus::Succeeded)
    }

    pub fn has_failed_actions(&self) -> bool {
        self.actions.iter().any(|a| a.status == ActionStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::predicate::{CompareOp, ConditionNode};
    use serde_json::json;

    fn playbook(mode: ExecutionMode) -> Playbook {
        Playbook::new(
            "Dunning",
            "payment_failed",
            ConditionNode::Compare {
                field: "amount".to_string(),
                operator: CompareOp::GreaterThan,
                value: json!(0),
            },
        )
        .with_execution_mode(mode)
        .with_action(ActionType::PaymentRetry, json!({}))
    }

    fn pending_run() -> PlaybookRun {
        PlaybookRun::from_playbook(
            &playbook(ExecutionMode::RequireApproval),
            "cust-1",
            0.9,
            500.0,
            "payment failed",
            DecisionSummary::default(),
            3,
        )
    }

    #[test]
    fn test_auto_execute_starts_executing() {
        let run = PlaybookRun::from_playbook(
            &playbook(ExecutionMode::AutoExecute),
            "cust-1",
            0.9,
            0.0,
            "r",
            DecisionSummary::default(),
            3,
        );
        assert_eq!(run.status, RunStatus::Executing);
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut run = pending_run();
        run.transition_to(RunStatus::Approved).unwrap();
        assert!(run.approved_at.is_some());
        run.transition_to(RunStatus::Executing).unwrap();
        run.transition_to(RunStatus::Completed).unwrap();
        assert!(run.completed_at.is_some());
        assert!(run.status.is_terminal());
    }

    #[test]
    fn test_invalid_transition_is_conflict_and_leaves_state() {
        let mut run = pending_run();
        run.transition_to(RunStatus::Approved).unwrap();
        let err = run.transition_to(RunStatus::Approved).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(run.status, RunStatus::Approved);
    }

    #[test]
    fn test_snooze_sets_and_clears_timestamp() {
        let mut run = pending_run();
        let until = Utc::now() + chrono::Duration::hours(8);
        run.snooze_until(until).unwrap();
        assert_eq!(run.status, RunStatus::Snoozed);
        assert_eq!(run.snoozed_until, Some(until));

        run.transition_to(RunStatus::Pending).unwrap();
        assert!(run.snoozed_until.is_none());
    }

    #[test]
    fn test_undismiss_only_for_failed_origin() {
        // Dismissed from Pending: undismiss rejected.
        let mut run = pending_run();
        run.transition_to(RunStatus::Dismissed).unwrap();
        assert_eq!(run.dismissed_from, Some(RunStatus::Pending));
        assert!(run.transition_to(RunStatus::Failed).is_err());

        // Dismissed from Failed: undismiss allowed.
        let mut run = pending_run();
        run.transition_to(RunStatus::Approved).unwrap();
        run.transition_to(RunStatus::Executing).unwrap();
        run.transition_to(RunStatus::Failed).unwrap();
        run.transition_to(RunStatus::Dismissed).unwrap();
        run.transition_to(RunStatus::Failed).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
    }

    #[test]
    fn test_escalated_resolves_like_pending() {
        let mut run = pending_run();
        run.transition_to(RunStatus::Escalated).unwrap();
        assert!(run.can_transition_to(RunStatus::Approved));
        assert!(run.can_transition_to(RunStatus::Dismissed));
        assert!(!run.can_transition_to(RunStatus::Snoozed));
    }

    #[test]
    fn test_action_retry_accounting() {
        let mut action = pending_run().actions[0].clone();
        action.attempt_count = 1;
        action.record_failure("timeout", "request timed out", true);
        assert!(action.can_auto_retry());

        action.attempt_count = action.max_attempts;
        assert!(!action.can_auto_retry());
        assert!(action.is_terminally_failed());

        action.record_failure("invalid_card", "card was declined", false);
        action.attempt_count = 1;
        assert!(!action.can_auto_retry());
    }
}
