//! SQLite implementation of the ConflictLogRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::EngineResult;
use crate::domain::models::ConflictLogEntry;
use crate::domain::ports::ConflictLogRepository;

#[derive(Clone)]
pub struct SqliteConflictLogRepository {
    pool: SqlitePool,
}

impl SqliteConflictLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ConflictRow {
    id: String,
    suppressed_playbook_id: String,
    suppressed_playbook_name: String,
    winning_playbook_id: Option<String>,
    winning_playbook_name: Option<String>,
    customer_id: String,
    reason: String,
    cooldown_ends_at: Option<String>,
    created_at: String,
}

fn row_to_entry(row: ConflictRow) -> EngineResult<ConflictLogEntry> {
    Ok(ConflictLogEntry {
        id: parse_uuid(&row.id)?,
        suppressed_playbook_id: parse_uuid(&row.suppressed_playbook_id)?,
        suppressed_playbook_name: row.suppressed_playbook_name,
        winning_playbook_id: parse_optional_uuid(row.winning_playbook_id)?,
        winning_playbook_name: row.winning_playbook_name,
        customer_id: row.customer_id,
        reason: row.reason,
        cooldown_ends_at: parse_optional_datetime(row.cooldown_ends_at)?,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl ConflictLogRepository for SqliteConflictLogRepository {
    async fn append(&self, entry: &ConflictLogEntry) -> EngineResult<()> {
        sqlx::query(
            r#"INSERT INTO conflict_log
               (id, suppressed_playbook_id, suppressed_playbook_name,
                winning_playbook_id, winning_playbook_name, customer_id,
                reason, cooldown_ends_at, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.suppressed_playbook_id.to_string())
        .bind(&entry.suppressed_playbook_name)
        .bind(entry.winning_playbook_id.map(|id| id.to_string()))
        .bind(&entry.winning_playbook_name)
        .bind(&entry.customer_id)
        .bind(&entry.reason)
        .bind(entry.cooldown_ends_at.map(|t| t.to_rfc3339()))
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_customer(&self, customer_id: &str) -> EngineResult<Vec<ConflictLogEntry>> {
        let rows: Vec<ConflictRow> = sqlx::query_as(
            "SELECT * FROM conflict_log WHERE customer_id = ? ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_entry).collect()
    }

    async fn list_for_playbook(&self, playbook_id: Uuid) -> EngineResult<Vec<ConflictLogEntry>> {
        let rows: Vec<ConflictRow> = sqlx::query_as(
            "SELECT * FROM conflict_log WHERE suppressed_playbook_id = ? ORDER BY created_at DESC",
        )
        .bind(playbook_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_entry).collect()
    }
}
