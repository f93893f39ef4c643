//! Playbook domain model.
//!
//! A playbook is a configured automation rule: a trigger predicate over
//! incoming signals, thresholds and suppression settings, and an ordered
//! list of actions to execute when it fires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::predicate::ConditionNode;

/// Lifecycle status of a playbook definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybookStatus {
    /// Being edited; never evaluated.
    Draft,
    /// Participates in evaluation.
    Active,
    /// Temporarily excluded from evaluation.
    Paused,
    /// Retired; kept for audit.
    Archived,
}

impl Default for PlaybookStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl PlaybookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Archived => "archived",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<PlaybookStatus> {
        match self {
            Self::Draft => vec![Self::Active, Self::Archived],
            Self::Active => vec![Self::Paused, Self::Archived],
            Self::Paused => vec![Self::Active, Self::Archived],
            Self::Archived => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Whether a run executes automatically or waits for human approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Runs enter Executing directly on creation.
    AutoExecute,
    /// Runs enter Pending and wait in the work queue.
    RequireApproval,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::RequireApproval
    }
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoExecute => "auto_execute",
            Self::RequireApproval => "require_approval",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto_execute" => Some(Self::AutoExecute),
            "require_approval" => Some(Self::RequireApproval),
            _ => None,
        }
    }
}

/// Type tag dispatching an action to its adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    PaymentRetry,
    CrmTask,
    MessagingAlert,
    Ticket,
    WorkflowTrigger,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentRetry => "payment_retry",
            Self::CrmTask => "crm_task",
            Self::MessagingAlert => "messaging_alert",
            Self::Ticket => "ticket",
            Self::WorkflowTrigger => "workflow_trigger",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "payment_retry" => Some(Self::PaymentRetry),
            "crm_task" => Some(Self::CrmTask),
            "messaging_alert" => Some(Self::MessagingAlert),
            "ticket" => Some(Self::Ticket),
            "workflow_trigger" => Some(Self::WorkflowTrigger),
            _ => None,
        }
    }
}

/// One configured action in a playbook's ordered action list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookAction {
    pub action_type: ActionType,
    pub order_index: u32,
    /// Adapter-specific configuration, passed through opaquely.
    #[serde(default)]
    pub config: Value,
}

/// A configured retention automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub id: Uuid,
    pub name: String,
    pub status: PlaybookStatus,
    pub category: String,
    /// The signal type this playbook declares interest in.
    pub trigger_type: String,
    /// Parsed trigger predicate (raw JSON is persisted; this is the cached AST).
    pub trigger_conditions: ConditionNode,
    /// Minimum signal confidence (0.0 to 1.0).
    pub min_confidence: f64,
    /// Minimum hours between runs for the same customer. Zero disables.
    pub cooldown_hours: u32,
    /// Maximum simultaneously open runs across all customers.
    pub max_concurrent_runs: u32,
    pub execution_mode: ExecutionMode,
    /// Lower value = higher precedence in conflict resolution.
    pub priority: i32,
    /// Segment ids this playbook targets; empty matches all customers.
    pub target_segments: Vec<String>,
    /// Ordered action list (strict total order by `order_index`).
    pub actions: Vec<PlaybookAction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Playbook {
    pub fn new(
        name: impl Into<String>,
        trigger_type: impl Into<String>,
        trigger_conditions: ConditionNode,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: PlaybookStatus::default(),
            category: String::new(),
            trigger_type: trigger_type.into(),
            trigger_conditions,
            min_confidence: 0.0,
            cooldown_hours: 0,
            max_concurrent_runs: 1,
            execution_mode: ExecutionMode::default(),
            priority: 100,
            target_segments: Vec::new(),
            actions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_status(mut self, status: PlaybookStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_cooldown_hours(mut self, hours: u32) -> Self {
        self.cooldown_hours = hours;
        self
    }

    pub fn with_max_concurrent_runs(mut self, max: u32) -> Self {
        self.max_concurrent_runs = max;
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_segments(mut self, segments: Vec<String>) -> Self {
        self.target_segments = segments;
        self
    }

    pub fn with_action(mut self, action_type: ActionType, config: Value) -> Self {
        let order_index = self.actions.len() as u32;
        self.actions.push(PlaybookAction { action_type, order_index, config });
        self
    }

    /// Whether this playbook participates in evaluation at all.
    pub fn is_evaluable(&self) -> bool {
        self.status == PlaybookStatus::Active
    }

    /// Validate the definition. Called at create/update time so evaluation
    /// never sees an invalid playbook.
    pub fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Validation("Playbook name cannot be empty".to_string()));
        }
        if self.trigger_type.trim().is_empty() {
            return Err(EngineError::Validation(
                "Playbook trigger type cannot be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(EngineError::Validation(format!(
                "min_confidence must be between 0 and 1, got {}",
                self.min_confidence
            )));
        }
        if self.max_concurrent_runs < 1 {
            return Err(EngineError::Validation(
                "max_concurrent_runs must be at least 1".to_string(),
            ));
        }
        self.trigger_conditions.validate()?;

        // Actions must form a strict total order by order_index.
        let mut indices: Vec<u32> = self.actions.iter().map(|a| a.order_index).collect();
        indices.sort_unstable();
        if indices.windows(2).any(|w| w[0] == w[1]) {
            return Err(EngineError::Validation(
                "Playbook actions must have unique order_index values".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a Draft copy of this playbook under a new id.
    pub fn duplicate(&self) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: format!("{} (copy)", self.name),
            status: PlaybookStatus::Draft,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Actions sorted by their configured order.
    pub fn ordered_actions(&self) -> Vec<&PlaybookAction> {
        let mut actions: Vec<&PlaybookAction> = self.actions.iter().collect();
        actions.sort_by_key(|a| a.order_index);
        actions
    }
}
