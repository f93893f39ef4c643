//! Executor behavior over real SQLite state: retry exhaustion, manual
//! retries, and undo compensation.

use std::sync::Arc;

use reclaim::adapters::actions::{AdapterRegistry, MockAdapter};
use reclaim::adapters::sqlite::{create_migrated_test_pool, SqlitePlaybookRepository, SqliteRunRepository};
use reclaim::domain::errors::EngineError;
use reclaim::domain::models::{
    ActionStatus, ActionType, CompareOp, ConditionNode, DecisionSummary, ExecutionConfig, Playbook,
    PlaybookRun, PlaybookStatus, RunStatus,
};
use reclaim::domain::ports::{AdapterError, PlaybookRepository, RunRepository};
use reclaim::services::{ActionExecutor, RunOutcome};
use serde_json::json;

fn fast_config() -> ExecutionConfig {
    // Single attempt per action so tests never sleep through backoff.
    ExecutionConfig { max_attempts: 1, initial_backoff_ms: 1, max_backoff_ms: 1 }
}

struct Harness {
    runs: Arc<SqliteRunRepository>,
    playbooks: SqlitePlaybookRepository,
}

async fn setup() -> Harness {
    let pool = create_migrated_test_pool().await.expect("test pool");
    Harness {
        runs: Arc::new(SqliteRunRepository::new(pool.clone())),
        playbooks: SqlitePlaybookRepository::new(pool),
    }
}

impl Harness {
    fn executor(&self, adapter: Arc<MockAdapter>) -> ActionExecutor {
        let registry =
            Arc::new(AdapterRegistry::new().with_adapter(ActionType::PaymentRetry, adapter));
        ActionExecutor::new(self.runs.clone(), registry, fast_config())
    }

    /// Seed an Approved run with a single payment_retry action.
    async fn approved_run(&self) -> PlaybookRun {
        let playbook = Playbook::new(
            "Dunning recovery",
            "payment_failed",
            ConditionNode::Compare {
                field: "amount".to_string(),
                operator: CompareOp::GreaterThan,
                value: json!(0),
            },
        )
        .with_status(PlaybookStatus::Active)
        .with_action(ActionType::PaymentRetry, json!({"strategy": "smart"}));
        self.playbooks.create(&playbook).await.expect("seed playbook");

        let mut run = PlaybookRun::from_playbook(
            &playbook,
            "cust-3",
            0.85,
            900.0,
            "Dunning recovery triggered by payment_failed",
            DecisionSummary::default(),
            1,
        );
        self.runs.create(&run).await.expect("seed run");
        run.transition_to(RunStatus::Approved).unwrap();
        self.runs.update_guarded(&run, RunStatus::Pending).await.expect("approve");
        run
    }
}

#[tokio::test]
async fn test_successful_execution_completes_run() {
    let h = setup().await;
    let adapter = Arc::new(MockAdapter::always_succeeding());
    let executor = h.executor(adapter.clone());
    let run = h.approved_run().await;

    let outcome = executor.execute(run.id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(adapter.call_count(), 1);

    let stored = h.runs.get(run.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Completed);
    assert_eq!(stored.outcome.as_deref(), Some("completed"));
    assert!(stored.completed_at.is_some());
    let action = &stored.actions[0];
    assert_eq!(action.status, ActionStatus::Succeeded);
    assert_eq!(action.attempt_count, 1);
    assert!(action.external_id.is_some());
}

#[tokio::test]
async fn test_exhausted_attempts_fail_the_run() {
    let h = setup().await;
    let adapter = Arc::new(MockAdapter::always_failing(AdapterError::retryable(
        "network_error",
        "connection reset",
    )));
    let executor = h.executor(adapter.clone());
    let run = h.approved_run().await;

    let outcome = executor.execute(run.id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Failed);
    assert_eq!(adapter.call_count(), 1);

    let stored = h.runs.get(run.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
    assert_eq!(stored.outcome.as_deref(), Some("failed"));
    let action = &stored.actions[0];
    assert_eq!(action.status, ActionStatus::Failed);
    assert_eq!(action.error_code.as_deref(), Some("network_error"));
    assert!(action.retryable);
}

#[tokio::test]
async fn test_terminal_error_stops_without_retry() {
    let h = setup().await;
    let adapter = Arc::new(MockAdapter::always_failing(AdapterError::terminal(
        "invalid_config",
        "missing url",
    )));
    let executor = h.executor(adapter.clone());
    let run = h.approved_run().await;

    executor.execute(run.id).await.unwrap();
    assert_eq!(adapter.call_count(), 1);

    let stored = h.runs.get(run.id).await.unwrap().unwrap();
    assert!(!stored.actions[0].retryable);
}

#[tokio::test]
async fn test_retry_all_recovers_a_failed_run() {
    let h = setup().await;
    let adapter = Arc::new(MockAdapter::failing_times(
        1,
        AdapterError::retryable("network_error", "connection reset"),
    ));
    let executor = h.executor(adapter.clone());
    let run = h.approved_run().await;

    assert_eq!(executor.execute(run.id).await.unwrap(), RunOutcome::Failed);

    let outcome = executor.retry_all(run.id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(adapter.call_count(), 2);

    let stored = h.runs.get(run.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Completed);
    assert_eq!(stored.actions[0].attempt_count, 2);
}

#[tokio::test]
async fn test_failed_action_stops_later_actions() {
    let h = setup().await;
    let playbook = Playbook::new(
        "Dunning recovery",
        "payment_failed",
        ConditionNode::Compare {
            field: "amount".to_string(),
            operator: CompareOp::GreaterThan,
            value: json!(0),
        },
    )
    .with_status(PlaybookStatus::Active)
    .with_action(ActionType::PaymentRetry, json!({"strategy": "smart"}))
    .with_action(ActionType::MessagingAlert, json!({"channel": "#retention"}));
    h.playbooks.create(&playbook).await.expect("seed playbook");

    let mut run = PlaybookRun::from_playbook(
        &playbook,
        "cust-3",
        0.85,
        900.0,
        "Dunning recovery triggered by payment_failed",
        DecisionSummary::default(),
        1,
    );
    h.runs.create(&run).await.expect("seed run");
    run.transition_to(RunStatus::Approved).unwrap();
    h.runs.update_guarded(&run, RunStatus::Pending).await.expect("approve");

    let payment = Arc::new(MockAdapter::failing_times(
        1,
        AdapterError::terminal("card_rejected", "issuer declined"),
    ));
    let alert = Arc::new(MockAdapter::always_succeeding());
    let registry = Arc::new(
        AdapterRegistry::new()
            .with_adapter(ActionType::PaymentRetry, payment.clone())
            .with_adapter(ActionType::MessagingAlert, alert.clone()),
    );
    let executor = ActionExecutor::new(h.runs.clone(), registry, fast_config());

    // The alert must not be delivered after the payment retry was
    // rejected terminally.
    assert_eq!(executor.execute(run.id).await.unwrap(), RunOutcome::Failed);
    assert_eq!(alert.call_count(), 0);

    let stored = h.runs.get(run.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
    assert_eq!(stored.actions[0].status, ActionStatus::Failed);
    assert_eq!(stored.actions[1].status, ActionStatus::Pending);
    assert_eq!(stored.actions[1].attempt_count, 0);

    // A retry pass clears the failure and resumes the tail in order.
    assert_eq!(executor.retry_all(run.id).await.unwrap(), RunOutcome::Completed);
    assert_eq!(payment.call_count(), 2);
    assert_eq!(alert.call_count(), 1);

    let stored = h.runs.get(run.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Completed);
    assert!(stored.all_actions_succeeded());
}

#[tokio::test]
async fn test_retry_all_skips_already_succeeded_actions() {
    let h = setup().await;
    let playbook = Playbook::new(
        "Dunning recovery",
        "payment_failed",
        ConditionNode::Compare {
            field: "amount".to_string(),
            operator: CompareOp::GreaterThan,
            value: json!(0),
        },
    )
    .with_status(PlaybookStatus::Active)
    .with_action(ActionType::PaymentRetry, json!({"strategy": "smart"}))
    .with_action(ActionType::CrmTask, json!({"title": "Follow up"}));
    h.playbooks.create(&playbook).await.expect("seed playbook");

    let mut run = PlaybookRun::from_playbook(
        &playbook,
        "cust-3",
        0.85,
        900.0,
        "Dunning recovery triggered by payment_failed",
        DecisionSummary::default(),
        1,
    );
    h.runs.create(&run).await.expect("seed run");
    run.transition_to(RunStatus::Approved).unwrap();
    h.runs.update_guarded(&run, RunStatus::Pending).await.expect("approve");

    let payment = Arc::new(MockAdapter::always_succeeding());
    let crm = Arc::new(MockAdapter::failing_times(
        1,
        AdapterError::retryable("rate_limited", "slow down"),
    ));
    let registry = Arc::new(
        AdapterRegistry::new()
            .with_adapter(ActionType::PaymentRetry, payment.clone())
            .with_adapter(ActionType::CrmTask, crm.clone()),
    );
    let executor = ActionExecutor::new(h.runs.clone(), registry, fast_config());

    // First pass: action 1 succeeds, action 2 fails retryable.
    assert_eq!(executor.execute(run.id).await.unwrap(), RunOutcome::Failed);
    let stored = h.runs.get(run.id).await.unwrap().unwrap();
    assert_eq!(stored.actions[0].status, ActionStatus::Succeeded);
    assert_eq!(stored.actions[1].status, ActionStatus::Failed);

    let outcome = executor.retry_all(run.id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    // The succeeded action is not re-executed.
    assert_eq!(payment.call_count(), 1);
    assert_eq!(crm.call_count(), 2);

    let stored = h.runs.get(run.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Completed);
    assert!(stored.all_actions_succeeded());
}

#[tokio::test]
async fn test_retry_rejected_while_run_not_failed() {
    let h = setup().await;
    let executor = h.executor(Arc::new(MockAdapter::always_succeeding()));
    let run = h.approved_run().await;

    executor.execute(run.id).await.unwrap();
    let err = executor.retry_all(run.id).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_undo_compensates_in_reverse_and_marks_outcome() {
    let h = setup().await;
    let adapter = Arc::new(MockAdapter::always_succeeding().undoable());
    let executor = h.executor(adapter.clone());
    let run = h.approved_run().await;

    executor.execute(run.id).await.unwrap();
    let undone = executor.undo(run.id).await.unwrap();

    assert_eq!(undone.outcome.as_deref(), Some("undone"));
    assert_eq!(adapter.undo_count(), 1);

    let stored = h.runs.get(run.id).await.unwrap().unwrap();
    assert_eq!(stored.outcome.as_deref(), Some("undone"));
}

#[tokio::test]
async fn test_undo_rejected_when_adapter_cannot_compensate() {
    let h = setup().await;
    let adapter = Arc::new(MockAdapter::always_succeeding());
    let executor = h.executor(adapter.clone());
    let run = h.approved_run().await;

    executor.execute(run.id).await.unwrap();
    let err = executor.undo(run.id).await.unwrap_err();
    assert!(matches!(err, EngineError::ExternalAction { ref code, .. } if code == "undo_unsupported"));
    assert_eq!(adapter.undo_count(), 0);
}
