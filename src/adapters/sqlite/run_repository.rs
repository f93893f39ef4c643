//! SQLite implementation of the RunRepository.
//!
//! Run writes are guarded on the expected source status so concurrent
//! lifecycle transitions resolve to one winner and a Conflict error for
//! everyone else.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_json, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{
    ActionStatus, ActionType, DecisionSummary, PlaybookRun, RunAction, RunStatus,
};
use crate::domain::ports::{RunFilter, RunRepository};

#[derive(Clone)]
pub struct SqliteRunRepository {
    pool: SqlitePool,
}

impl SqliteRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_actions(&self, run_id: Uuid) -> EngineResult<Vec<RunAction>> {
        let rows: Vec<ActionRow> =
            sqlx::query_as("SELECT * FROM run_actions WHERE run_id = ? ORDER BY order_index")
                .bind(run_id.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(row_to_action).collect()
    }

    async fn hydrate(&self, row: RunRow) -> EngineResult<PlaybookRun> {
        let mut run = row_to_run(row)?;
        run.actions = self.load_actions(run.id).await?;
        Ok(run)
    }

    async fn hydrate_all(&self, rows: Vec<RunRow>) -> EngineResult<Vec<PlaybookRun>> {
        let mut runs = Vec::with_capacity(rows.len());
        for row in rows {
            runs.push(self.hydrate(row).await?);
        }
        Ok(runs)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RunRow {
    id: String,
    playbook_id: String,
    customer_id: String,
    status: String,
    outcome: Option<String>,
    confidence: f64,
    potential_value: f64,
    reason: String,
    decision_summary: String,
    dismissed_from: Option<String>,
    created_at: String,
    updated_at: String,
    approved_at: Option<String>,
    completed_at: Option<String>,
    snoozed_until: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ActionRow {
    id: String,
    run_id: String,
    action_type: String,
    order_index: i64,
    config: String,
    status: String,
    attempt_count: i64,
    max_attempts: i64,
    external_id: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
    retryable: i64,
    last_attempt_at: Option<String>,
}

fn row_to_run(row: RunRow) -> EngineResult<PlaybookRun> {
    let decision_summary: DecisionSummary = parse_json(&row.decision_summary)?;
    let dismissed_from = row
        .dismissed_from
        .map(|s| {
            RunStatus::from_str(&s)
                .ok_or_else(|| EngineError::Serialization(format!("Unknown run status: {s}")))
        })
        .transpose()?;

    Ok(PlaybookRun {
        id: parse_uuid(&row.id)?,
        playbook_id: parse_uuid(&row.playbook_id)?,
        customer_id: row.customer_id,
        status: RunStatus::from_str(&row.status)
            .ok_or_else(|| EngineError::Serialization(format!("Unknown run status: {}", row.status)))?,
        outcome: row.outcome,
        confidence: row.confidence,
        potential_value: row.potential_value,
        reason: row.reason,
        decision_summary,
        actions: Vec::new(),
        dismissed_from,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
        approved_at: parse_optional_datetime(row.approved_at)?,
        completed_at: parse_optional_datetime(row.completed_at)?,
        snoozed_until: parse_optional_datetime(row.snoozed_until)?,
    })
}

fn row_to_action(row: ActionRow) -> EngineResult<RunAction> {
    Ok(RunAction {
        id: parse_uuid(&row.id)?,
        run_id: parse_uuid(&row.run_id)?,
        action_type: ActionType::from_str(&row.action_type)
            .ok_or_else(|| EngineError::Serialization(format!("Unknown action type: {}", row.action_type)))?,
        order_index: row.order_index as u32,
        config: parse_json(&row.config)?,
        status: ActionStatus::from_str(&row.status)
            .ok_or_else(|| EngineError::Serialization(format!("Unknown action status: {}", row.status)))?,
        attempt_count: row.attempt_count as u32,
        max_attempts: row.max_attempts as u32,
        external_id: row.external_id,
        error_code: row.error_code,
        error_message: row.error_message,
        retryable: row.retryable != 0,
        last_attempt_at: parse_optional_datetime(row.last_attempt_at)?,
    })
}

#[async_trait]
impl RunRepository for SqliteRunRepository {
    async fn create(&self, run: &PlaybookRun) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO playbook_runs
               (id, playbook_id, customer_id, status, outcome, confidence,
                potential_value, reason, decision_summary, dismissed_from,
                created_at, updated_at, approved_at, completed_at, snoozed_until)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(run.id.to_string())
        .bind(run.playbook_id.to_string())
        .bind(&run.customer_id)
        .bind(run.status.as_str())
        .bind(&run.outcome)
        .bind(run.confidence)
        .bind(run.potential_value)
        .bind(&run.reason)
        .bind(serde_json::to_string(&run.decision_summary)?)
        .bind(run.dismissed_from.map(|s| s.as_str()))
        .bind(run.created_at.to_rfc3339())
        .bind(run.updated_at.to_rfc3339())
        .bind(run.approved_at.map(|t| t.to_rfc3339()))
        .bind(run.completed_at.map(|t| t.to_rfc3339()))
        .bind(run.snoozed_until.map(|t| t.to_rfc3339()))
        .execute(&mut *tx)
        .await?;

        for action in &run.actions {
            sqlx::query(
                r#"INSERT INTO run_actions
                   (id, run_id, action_type, order_index, config, status,
                    attempt_count, max_attempts, external_id, error_code,
                    error_message, retryable, last_attempt_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(action.id.to_string())
            .bind(action.run_id.to_string())
            .bind(action.action_type.as_str())
            .bind(i64::from(action.order_index))
            .bind(serde_json::to_string(&action.config)?)
            .bind(action.status.as_str())
            .bind(i64::from(action.attempt_count))
            .bind(i64::from(action.max_attempts))
            .bind(&action.external_id)
            .bind(&action.error_code)
            .bind(&action.error_message)
            .bind(i64::from(action.retryable))
            .bind(action.last_attempt_at.map(|t| t.to_rfc3339()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> EngineResult<Option<PlaybookRun>> {
        let row: Option<RunRow> = sqlx::query_as("SELECT * FROM playbook_runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn update_guarded(&self, run: &PlaybookRun, expected: RunStatus) -> EngineResult<()> {
        let result = sqlx::query(
            r#"UPDATE playbook_runs SET
               status = ?, outcome = ?, decision_summary = ?, dismissed_from = ?,
               updated_at = ?, approved_at = ?, completed_at = ?, snoozed_until = ?
               WHERE id = ? AND status = ?"#,
        )
        .bind(run.status.as_str())
        .bind(&run.outcome)
        .bind(serde_json::to_string(&run.decision_summary)?)
        .bind(run.dismissed_from.map(|s| s.as_str()))
        .bind(run.updated_at.to_rfc3339())
        .bind(run.approved_at.map(|t| t.to_rfc3339()))
        .bind(run.completed_at.map(|t| t.to_rfc3339()))
        .bind(run.snoozed_until.map(|t| t.to_rfc3339()))
        .bind(run.id.to_string())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Either the run is gone or another writer moved it first.
            let exists: Option<(String,)> =
                sqlx::query_as("SELECT status FROM playbook_runs WHERE id = ?")
                    .bind(run.id.to_string())
                    .fetch_optional(&self.pool)
                    .await?;
            return match exists {
                None => Err(EngineError::RunNotFound(run.id)),
                Some((current,)) => Err(EngineError::Conflict {
                    from: expected.as_str().to_string(),
                    to: run.status.as_str().to_string(),
                    reason: format!("run already moved to {current}"),
                }),
            };
        }
        Ok(())
    }

    async fn update_action(&self, action: &RunAction) -> EngineResult<()> {
        let result = sqlx::query(
            r#"UPDATE run_actions SET
               status = ?, attempt_count = ?, external_id = ?,
               error_code = ?, error_message = ?, retryable = ?, last_attempt_at = ?
               WHERE id = ?"#,
        )
        .bind(action.status.as_str())
        .bind(i64::from(action.attempt_count))
        .bind(&action.external_id)
        .bind(&action.error_code)
        .bind(&action.error_message)
        .bind(i64::from(action.retryable))
        .bind(action.last_attempt_at.map(|t| t.to_rfc3339()))
        .bind(action.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::ActionNotFound(action.id));
        }
        Ok(())
    }

    async fn list(&self, filter: RunFilter) -> EngineResult<Vec<PlaybookRun>> {
        let mut sql = String::from("SELECT * FROM playbook_runs WHERE 1=1");
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.playbook_id.is_some() {
            sql.push_str(" AND playbook_id = ?");
        }
        if filter.customer_id.is_some() {
            sql.push_str(" AND customer_id = ?");
        }
        sql.push_str(" ORDER BY created_at DESC");
        if filter.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query_as::<_, RunRow>(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(playbook_id) = filter.playbook_id {
            query = query.bind(playbook_id.to_string());
        }
        if let Some(customer_id) = &filter.customer_id {
            query = query.bind(customer_id.clone());
        }
        if let Some(limit) = filter.limit {
            query = query.bind(limit);
        }

        let rows = query.fetch_all(&self.pool).await?;
        self.hydrate_all(rows).await
    }

    async fn list_transitioned_since(&self, since: DateTime<Utc>) -> EngineResult<Vec<PlaybookRun>> {
        let rows: Vec<RunRow> = sqlx::query_as(
            "SELECT * FROM playbook_runs WHERE updated_at >= ? ORDER BY updated_at DESC",
        )
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_all(rows).await
    }

    async fn list_failed(&self) -> EngineResult<Vec<PlaybookRun>> {
        let rows: Vec<RunRow> = sqlx::query_as(
            "SELECT * FROM playbook_runs WHERE status = 'failed' ORDER BY updated_at",
        )
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_all(rows).await
    }

    async fn list_snooze_expired(&self, now: DateTime<Utc>) -> EngineResult<Vec<PlaybookRun>> {
        let rows: Vec<RunRow> = sqlx::query_as(
            "SELECT * FROM playbook_runs
             WHERE status = 'snoozed' AND snoozed_until IS NOT NULL AND snoozed_until <= ?
             ORDER BY snoozed_until",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_all(rows).await
    }

    async fn count_open_for_playbook(&self, playbook_id: Uuid) -> EngineResult<u32> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM playbook_runs
             WHERE playbook_id = ? AND status IN ('pending', 'approved', 'executing', 'escalated')",
        )
        .bind(playbook_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::adapters::sqlite::SqlitePlaybookRepository;
    use crate::domain::models::{CompareOp, ConditionNode, Playbook};
    use crate::domain::ports::PlaybookRepository;
    use serde_json::json;

    async fn seeded_run(pool: &SqlitePool) -> PlaybookRun {
        let playbooks = SqlitePlaybookRepository::new(pool.clone());
        let playbook = Playbook::new(
            "Dunning",
            "payment_failed",
            ConditionNode::Compare {
                field: "amount".to_string(),
                operator: CompareOp::GreaterThan,
                value: json!(0),
            },
        )
        .with_action(crate::domain::models::ActionType::PaymentRetry, json!({}));
        playbooks.create(&playbook).await.unwrap();

        PlaybookRun::from_playbook(
            &playbook,
            "cust-1",
            0.9,
            750.0,
            "payment failed",
            DecisionSummary::default(),
            3,
        )
    }

    #[tokio::test]
    async fn test_create_and_get_with_actions() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteRunRepository::new(pool.clone());

        let run = seeded_run(&pool).await;
        repo.create(&run).await.unwrap();

        let loaded = repo.get(run.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Pending);
        assert_eq!(loaded.actions.len(), 1);
        assert_eq!(loaded.actions[0].max_attempts, 3);
    }

    #[tokio::test]
    async fn test_update_guarded_detects_stale_writer() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteRunRepository::new(pool.clone());

        let mut run = seeded_run(&pool).await;
        repo.create(&run).await.unwrap();

        // First writer wins.
        let expected = run.status;
        run.transition_to(RunStatus::Approved).unwrap();
        repo.update_guarded(&run, expected).await.unwrap();

        // Second writer still holds the Pending snapshot.
        let mut stale = repo.get(run.id).await.unwrap().unwrap();
        stale.status = RunStatus::Pending;
        let mut dismissed = stale.clone();
        dismissed.transition_to(RunStatus::Dismissed).unwrap();
        let err = repo
            .update_guarded(&dismissed, RunStatus::Pending)
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let current = repo.get(run.id).await.unwrap().unwrap();
        assert_eq!(current.status, RunStatus::Approved);
    }

    #[tokio::test]
    async fn test_count_open_excludes_closed_runs() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteRunRepository::new(pool.clone());

        let run = seeded_run(&pool).await;
        repo.create(&run).await.unwrap();
        assert_eq!(repo.count_open_for_playbook(run.playbook_id).await.unwrap(), 1);

        let mut dismissed = run.clone();
        dismissed.transition_to(RunStatus::Dismissed).unwrap();
        repo.update_guarded(&dismissed, RunStatus::Pending).await.unwrap();
        assert_eq!(repo.count_open_for_playbook(run.playbook_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_snooze_expired_honors_cutoff() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteRunRepository::new(pool.clone());

        let mut run = seeded_run(&pool).await;
        run.snooze_until(Utc::now() - chrono::Duration::hours(1)).unwrap();
        repo.create(&run).await.unwrap();

        let mut later = seeded_run(&pool).await;
        later.snooze_until(Utc::now() + chrono::Duration::hours(8)).unwrap();
        repo.create(&later).await.unwrap();

        let expired = repo.list_snooze_expired(Utc::now()).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, run.id);
    }
}
