//! Trigger evaluation results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::run::DecisionSummary;

/// Why a qualifying playbook did not (or would not) produce a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuppressionReason {
    /// Inside the per-(customer, playbook) cooldown window.
    Cooldown { ends_at: DateTime<Utc> },
    /// The playbook's open-run count is at its configured maximum.
    ConcurrencyLimit { active: u32, max: u32 },
    /// Lost arbitration to a higher-precedence playbook.
    LostConflict { winner_id: Uuid, winner_name: String },
}

impl SuppressionReason {
    /// Short reason string for audit rows and diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::Cooldown { ends_at } => {
                format!("cooldown until {}", ends_at.to_rfc3339())
            }
            Self::ConcurrencyLimit { active, max } => {
                format!("concurrency limit reached ({active}/{max} active runs)")
            }
            Self::LostConflict { winner_name, .. } => {
                format!("lower priority than {winner_name}")
            }
        }
    }
}

/// One unmet requirement recorded by a failed evaluation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MissingCondition {
    /// A predicate clause did not hold.
    Condition { clause: String },
    /// Signal confidence below the playbook's threshold.
    Confidence { actual: f64, required: f64 },
    /// Customer is in none of the target segments.
    Segment { matched: Vec<String>, missing: Vec<String> },
}

/// The structured result of evaluating one playbook against one signal.
///
/// The decision summary is populated even when `would_trigger` is false,
/// so clients can show why a playbook stayed quiet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvaluation {
    pub playbook_id: Uuid,
    pub playbook_name: String,
    pub customer_id: String,
    pub would_trigger: bool,
    #[serde(default)]
    pub missing_conditions: Vec<MissingCondition>,
    pub suppression: Option<SuppressionReason>,
    pub decision_summary: DecisionSummary,
    pub evaluated_at: DateTime<Utc>,
}
