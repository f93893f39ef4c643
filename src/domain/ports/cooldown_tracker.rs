use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::EngineResult;
use crate::domain::models::Playbook;

/// Result of a suppression check or claim attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimDecision {
    /// The (customer, playbook) pair is free and (for `claim`) now holds
    /// a fresh cooldown record.
    Claimed,
    /// Inside an unexpired cooldown window.
    OnCooldown { ends_at: DateTime<Utc> },
    /// The playbook is at its open-run maximum.
    ConcurrencyLimited { active: u32, max: u32 },
}

impl ClaimDecision {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed)
    }
}

/// Tracks last-fired timestamps per (customer, playbook) and answers
/// suppression queries.
///
/// `claim` must be a single atomic compare-and-set against the backing
/// store ("no unexpired cooldown AND open-run count below max, then record
/// a new cooldown"), never a read-then-write pair, so duplicate runs cannot
/// be created under concurrent signals for the same customer.
#[async_trait]
pub trait CooldownTracker: Send + Sync {
    /// Non-mutating suppression query, used during evaluation.
    async fn check(
        &self,
        customer_id: &str,
        playbook: &Playbook,
        now: DateTime<Utc>,
    ) -> EngineResult<ClaimDecision>;

    /// Atomic claim-on-fire. On `Claimed` the cooldown record has been
    /// written inside the same transactional step as the checks.
    async fn claim(
        &self,
        customer_id: &str,
        playbook: &Playbook,
        now: DateTime<Utc>,
    ) -> EngineResult<ClaimDecision>;

    /// The last time a run was created for this pair, if ever.
    async fn last_fired(
        &self,
        customer_id: &str,
        playbook_id: Uuid,
    ) -> EngineResult<Option<DateTime<Utc>>>;
}
