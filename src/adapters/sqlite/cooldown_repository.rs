//! SQLite implementation of the CooldownTracker.
//!
//! `claim` runs inside one transaction whose first statement is a guarded
//! cooldown upsert, so the transaction holds the write lock for the whole
//! claim and two signals racing on the same (customer, playbook) pair
//! serialize here. The transaction commits only on a successful claim;
//! every other exit, including cancellation of the future, rolls back.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::parse_datetime;
use crate::domain::errors::EngineResult;
use crate::domain::models::{CooldownRecord, Playbook};
use crate::domain::ports::{ClaimDecision, CooldownTracker};

#[derive(Clone)]
pub struct SqliteCooldownTracker {
    pool: SqlitePool,
}

impl SqliteCooldownTracker {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const OPEN_STATUSES: &str = "('pending', 'approved', 'executing', 'escalated')";

/// Advances `last_fired_at` only when the previous window has expired.
/// `rows_affected` is the claim verdict: zero means the window is open.
const CLAIM_SQL: &str = "INSERT INTO cooldowns (customer_id, playbook_id, last_fired_at)
     VALUES (?, ?, ?)
     ON CONFLICT (customer_id, playbook_id) DO UPDATE
     SET last_fired_at = excluded.last_fired_at
     WHERE cooldowns.last_fired_at <= ?";

#[async_trait]
impl CooldownTracker for SqliteCooldownTracker {
    async fn check(
        &self,
        customer_id: &str,
        playbook: &Playbook,
        now: DateTime<Utc>,
    ) -> EngineResult<ClaimDecision> {
        if playbook.cooldown_hours > 0 {
            if let Some(last_fired) = self.last_fired(customer_id, playbook.id).await? {
                let record = CooldownRecord::new(customer_id, playbook.id, last_fired);
                if record.is_active(playbook.cooldown_hours, now) {
                    return Ok(ClaimDecision::OnCooldown {
                        ends_at: record.ends_at(playbook.cooldown_hours),
                    });
                }
            }
        }

        let sql = format!(
            "SELECT COUNT(*) FROM playbook_runs WHERE playbook_id = ? AND status IN {OPEN_STATUSES}"
        );
        let (active,): (i64,) = sqlx::query_as(&sql)
            .bind(playbook.id.to_string())
            .fetch_one(&self.pool)
            .await?;
        let active = active as u32;
        if active >= playbook.max_concurrent_runs {
            return Ok(ClaimDecision::ConcurrencyLimited {
                active,
                max: playbook.max_concurrent_runs,
            });
        }

        Ok(ClaimDecision::Claimed)
    }

    async fn claim(
        &self,
        customer_id: &str,
        playbook: &Playbook,
        now: DateTime<Utc>,
    ) -> EngineResult<ClaimDecision> {
        // Dropping the transaction on any early exit rolls it back, so a
        // cancelled claim never leaks a half-applied upsert.
        let mut tx = self.pool.begin().await?;

        // Window check and advance in one statement. Matches
        // CooldownRecord::is_active: expired when last_fired_at is at or
        // before now minus the window.
        let cutoff = now - Duration::hours(i64::from(playbook.cooldown_hours));
        let advanced = sqlx::query(CLAIM_SQL)
            .bind(customer_id)
            .bind(playbook.id.to_string())
            .bind(now.to_rfc3339())
            .bind(cutoff.to_rfc3339())
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !advanced {
            // The conflict target exists with an open window; read it back
            // for the precise end time.
            let row: Option<(String,)> = sqlx::query_as(
                "SELECT last_fired_at FROM cooldowns WHERE customer_id = ? AND playbook_id = ?",
            )
            .bind(customer_id)
            .bind(playbook.id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
            tx.rollback().await?;

            let ends_at = match row {
                Some((last_fired,)) => {
                    CooldownRecord::new(customer_id, playbook.id, parse_datetime(&last_fired)?)
                        .ends_at(playbook.cooldown_hours)
                }
                None => now,
            };
            return Ok(ClaimDecision::OnCooldown { ends_at });
        }

        let sql = format!(
            "SELECT COUNT(*) FROM playbook_runs WHERE playbook_id = ? AND status IN {OPEN_STATUSES}"
        );
        let (active,): (i64,) = sqlx::query_as(&sql)
            .bind(playbook.id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        let active = active as u32;
        if active >= playbook.max_concurrent_runs {
            tx.rollback().await?;
            return Ok(ClaimDecision::ConcurrencyLimited {
                active,
                max: playbook.max_concurrent_runs,
            });
        }

        tx.commit().await?;
        Ok(ClaimDecision::Claimed)
    }

    async fn last_fired(
        &self,
        customer_id: &str,
        playbook_id: Uuid,
    ) -> EngineResult<Option<DateTime<Utc>>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT last_fired_at FROM cooldowns WHERE customer_id = ? AND playbook_id = ?",
        )
        .bind(customer_id)
        .bind(playbook_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(s,)| parse_datetime(&s)).transpose()
    }
}
