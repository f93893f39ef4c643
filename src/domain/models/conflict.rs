//! Conflict log audit entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only record of a playbook that qualified but was suppressed,
/// either by losing arbitration or by a claim-time race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictLogEntry {
    pub id: Uuid,
    pub suppressed_playbook_id: Uuid,
    pub suppressed_playbook_name: String,
    /// None when no winner emerged (e.g. every candidate was suppressed).
    pub winning_playbook_id: Option<Uuid>,
    pub winning_playbook_name: Option<String>,
    pub customer_id: String,
    pub reason: String,
    pub cooldown_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ConflictLogEntry {
    pub fn new(
        suppressed_playbook_id: Uuid,
        suppressed_playbook_name: impl Into<String>,
        customer_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            suppressed_playbook_id,
            suppressed_playbook_name: suppressed_playbook_name.into(),
            winning_playbook_id: None,
            winning_playbook_name: None,
            customer_id: customer_id.into(),
            reason: reason.into(),
            cooldown_ends_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_winner(mut self, winner_id: Uuid, winner_name: impl Into<String>) -> Self {
        self.winning_playbook_id = Some(winner_id);
        self.winning_playbook_name = Some(winner_name.into());
        self
    }

    pub fn with_cooldown_ends_at(mut self, ends_at: DateTime<Utc>) -> Self {
        self.cooldown_ends_at = Some(ends_at);
        self
    }
}
