//! SQLite implementation of the PlaybookRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_json, parse_uuid};
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{
    ConditionNode, ExecutionMode, Playbook, PlaybookAction, PlaybookStatus,
};
use crate::domain::ports::{PlaybookFilter, PlaybookRepository};

#[derive(Clone)]
pub struct SqlitePlaybookRepository {
    pool: SqlitePool,
}

impl SqlitePlaybookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlaybookRow {
    id: String,
    name: String,
    status: String,
    category: String,
    trigger_type: String,
    trigger_conditions: String,
    min_confidence: f64,
    cooldown_hours: i64,
    max_concurrent_runs: i64,
    execution_mode: String,
    priority: i64,
    target_segments: String,
    actions: String,
    created_at: String,
    updated_at: String,
}

fn row_to_playbook(row: PlaybookRow) -> EngineResult<Playbook> {
    let trigger_conditions: ConditionNode = parse_json(&row.trigger_conditions)?;
    let target_segments: Vec<String> = parse_json(&row.target_segments)?;
    let actions: Vec<PlaybookAction> = parse_json(&row.actions)?;

    Ok(Playbook {
        id: parse_uuid(&row.id)?,
        name: row.name,
        status: PlaybookStatus::from_str(&row.status)
            .ok_or_else(|| EngineError::Serialization(format!("Unknown playbook status: {}", row.status)))?,
        category: row.category,
        trigger_type: row.trigger_type,
        trigger_conditions,
        min_confidence: row.min_confidence,
        cooldown_hours: row.cooldown_hours as u32,
        max_concurrent_runs: row.max_concurrent_runs as u32,
        execution_mode: ExecutionMode::from_str(&row.execution_mode)
            .ok_or_else(|| EngineError::Serialization(format!("Unknown execution mode: {}", row.execution_mode)))?,
        priority: row.priority as i32,
        target_segments,
        actions,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

#[async_trait]
impl PlaybookRepository for SqlitePlaybookRepository {
    async fn create(&self, playbook: &Playbook) -> EngineResult<()> {
        sqlx::query(
            r#"INSERT INTO playbooks
               (id, name, status, category, trigger_type, trigger_conditions,
                min_confidence, cooldown_hours, max_concurrent_runs, execution_mode,
                priority, target_segments, actions, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(playbook.id.to_string())
        .bind(&playbook.name)
        .bind(playbook.status.as_str())
        .bind(&playbook.category)
        .bind(&playbook.trigger_type)
        .bind(serde_json::to_string(&playbook.trigger_conditions)?)
        .bind(playbook.min_confidence)
        .bind(i64::from(playbook.cooldown_hours))
        .bind(i64::from(playbook.max_concurrent_runs))
        .bind(playbook.execution_mode.as_str())
        .bind(i64::from(playbook.priority))
        .bind(serde_json::to_string(&playbook.target_segments)?)
        .bind(serde_json::to_string(&playbook.actions)?)
        .bind(playbook.created_at.to_rfc3339())
        .bind(playbook.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> EngineResult<Option<Playbook>> {
        let row: Option<PlaybookRow> = sqlx::query_as("SELECT * FROM playbooks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_playbook).transpose()
    }

    async fn update(&self, playbook: &Playbook) -> EngineResult<()> {
        let result = sqlx::query(
            r#"UPDATE playbooks SET
               name = ?, status = ?, category = ?, trigger_type = ?,
               trigger_conditions = ?, min_confidence = ?, cooldown_hours = ?,
               max_concurrent_runs = ?, execution_mode = ?, priority = ?,
               target_segments = ?, actions = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&playbook.name)
        .bind(playbook.status.as_str())
        .bind(&playbook.category)
        .bind(&playbook.trigger_type)
        .bind(serde_json::to_string(&playbook.trigger_conditions)?)
        .bind(playbook.min_confidence)
        .bind(i64::from(playbook.cooldown_hours))
        .bind(i64::from(playbook.max_concurrent_runs))
        .bind(playbook.execution_mode.as_str())
        .bind(i64::from(playbook.priority))
        .bind(serde_json::to_string(&playbook.target_segments)?)
        .bind(serde_json::to_string(&playbook.actions)?)
        .bind(playbook.updated_at.to_rfc3339())
        .bind(playbook.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::PlaybookNotFound(playbook.id));
        }
        Ok(())
    }

    async fn list(&self, filter: PlaybookFilter) -> EngineResult<Vec<Playbook>> {
        let mut sql = String::from("SELECT * FROM playbooks WHERE 1=1");
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.trigger_type.is_some() {
            sql.push_str(" AND trigger_type = ?");
        }
        if filter.category.is_some() {
            sql.push_str(" AND category = ?");
        }
        sql.push_str(" ORDER BY priority, name");

        let mut query = sqlx::query_as::<_, PlaybookRow>(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(trigger_type) = &filter.trigger_type {
            query = query.bind(trigger_type.clone());
        }
        if let Some(category) = &filter.category {
            query = query.bind(category.clone());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_playbook).collect()
    }

    async fn list_active_for_trigger(&self, trigger_type: &str) -> EngineResult<Vec<Playbook>> {
        let rows: Vec<PlaybookRow> = sqlx::query_as(
            "SELECT * FROM playbooks WHERE status = 'active' AND trigger_type = ? ORDER BY priority, name",
        )
        .bind(trigger_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_playbook).collect()
    }
}
