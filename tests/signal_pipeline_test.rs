//! End-to-end signal pipeline tests: evaluation, arbitration, run
//! creation, and cooldown re-evaluation against a real SQLite store.

use std::sync::Arc;

use reclaim::adapters::actions::{AdapterRegistry, MockAdapter};
use reclaim::adapters::sqlite::{
    create_migrated_test_pool, SqliteConflictLogRepository, SqliteCooldownTracker,
    SqlitePlaybookRepository, SqliteRunRepository,
};
use reclaim::domain::models::{
    ActionType, CompareOp, ConditionNode, CustomerSnapshot, ExecutionConfig, ExecutionMode,
    Playbook, PlaybookStatus, RunStatus, Signal, SuppressionReason,
};
use reclaim::domain::ports::{ConflictLogRepository, PlaybookRepository, StaticSegmentMatcher};
use reclaim::services::{
    ActionExecutor, ConflictResolver, RunLifecycleService, SignalProcessor, TriggerEvaluator,
};
use serde_json::json;

struct Harness {
    playbooks: Arc<SqlitePlaybookRepository>,
    conflicts: Arc<SqliteConflictLogRepository>,
    processor: SignalProcessor,
}

async fn setup() -> Harness {
    let pool = create_migrated_test_pool().await.expect("test pool");
    let playbooks = Arc::new(SqlitePlaybookRepository::new(pool.clone()));
    let runs = Arc::new(SqliteRunRepository::new(pool.clone()));
    let tracker = Arc::new(SqliteCooldownTracker::new(pool.clone()));
    let conflicts = Arc::new(SqliteConflictLogRepository::new(pool.clone()));

    let evaluator = Arc::new(TriggerEvaluator::new(
        Arc::new(StaticSegmentMatcher::new()),
        tracker.clone(),
    ));
    let resolver = Arc::new(ConflictResolver::new(tracker, conflicts.clone()));
    let lifecycle = Arc::new(RunLifecycleService::new(runs.clone(), 3));
    let registry = Arc::new(
        AdapterRegistry::new()
            .with_adapter(ActionType::PaymentRetry, Arc::new(MockAdapter::always_succeeding()))
            .with_adapter(ActionType::CrmTask, Arc::new(MockAdapter::always_succeeding())),
    );
    let executor = Arc::new(ActionExecutor::new(runs, registry, ExecutionConfig::default()));

    Harness {
        playbooks: playbooks.clone(),
        conflicts,
        processor: SignalProcessor::new(playbooks, evaluator, resolver, lifecycle, executor),
    }
}

fn payment_playbook(name: &str, priority: i32) -> Playbook {
    Playbook::new(
        name,
        "payment_failed",
        ConditionNode::Compare {
            field: "amount".to_string(),
            operator: CompareOp::GreaterThan,
            value: json!(100),
        },
    )
    .with_status(PlaybookStatus::Active)
    .with_priority(priority)
    .with_cooldown_hours(24)
    .with_max_concurrent_runs(10)
    .with_action(ActionType::PaymentRetry, json!({"strategy": "smart"}))
}

fn signal() -> Signal {
    Signal::new("cust-1", "payment_failed")
        .with_confidence(0.9)
        .with_attribute("amount", json!(450))
        .with_attribute("potential_value", json!(1200.0))
}

fn customer() -> CustomerSnapshot {
    CustomerSnapshot::new("cust-1", "Acme Corp")
}

#[tokio::test]
async fn test_higher_priority_playbook_wins_and_loser_is_logged() {
    let h = setup().await;
    let winner = payment_playbook("Dunning recovery", 1);
    let loser = payment_playbook("Billing outreach", 5);
    h.playbooks.create(&winner).await.unwrap();
    h.playbooks.create(&loser).await.unwrap();

    let outcome = h.processor.process(&signal(), &customer()).await.unwrap();

    let run = outcome.created_run.expect("exactly one run");
    assert_eq!(run.playbook_id, winner.id);
    assert_eq!(run.status, RunStatus::Pending);
    assert!((run.potential_value - 1200.0).abs() < f64::EPSILON);
    assert_eq!(outcome.evaluations.len(), 2);

    let logged = h.conflicts.list_for_customer("cust-1").await.unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].suppressed_playbook_id, loser.id);
    assert_eq!(logged[0].winning_playbook_id, Some(winner.id));
    assert!(logged[0].reason.contains("lower priority"));
}

#[tokio::test]
async fn test_cooldown_suppresses_second_signal() {
    let h = setup().await;
    let playbook = payment_playbook("Dunning recovery", 1);
    h.playbooks.create(&playbook).await.unwrap();

    let first = h.processor.process(&signal(), &customer()).await.unwrap();
    assert!(first.created_run.is_some());

    let second = h.processor.process(&signal(), &customer()).await.unwrap();
    assert!(second.created_run.is_none());
    assert_eq!(second.evaluations.len(), 1);
    assert!(!second.evaluations[0].would_trigger);
    match second.evaluations[0].suppression {
        Some(SuppressionReason::Cooldown { ends_at }) => {
            // The window runs 24h from the first claim.
            let expected = first.created_run.unwrap().created_at + chrono::Duration::hours(24);
            assert!((ends_at - expected).num_seconds().abs() < 5);
        }
        ref other => panic!("expected cooldown suppression, got {other:?}"),
    }

    // A different customer is not affected by cust-1's cooldown.
    let other_signal = Signal::new("cust-2", "payment_failed")
        .with_confidence(0.9)
        .with_attribute("amount", json!(300));
    let other = h
        .processor
        .process(&other_signal, &CustomerSnapshot::new("cust-2", "Globex"))
        .await
        .unwrap();
    assert!(other.created_run.is_some());
}

#[tokio::test]
async fn test_auto_execute_playbook_completes_without_approval() {
    let h = setup().await;
    let playbook = payment_playbook("Instant retry", 1).with_execution_mode(ExecutionMode::AutoExecute);
    h.playbooks.create(&playbook).await.unwrap();

    let outcome = h.processor.process(&signal(), &customer()).await.unwrap();

    let run = outcome.created_run.expect("run created");
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.all_actions_succeeded());
    assert_eq!(run.outcome.as_deref(), Some("completed"));
}

#[tokio::test]
async fn test_non_qualifying_signal_creates_nothing() {
    let h = setup().await;
    let playbook = payment_playbook("Dunning recovery", 1);
    h.playbooks.create(&playbook).await.unwrap();

    let small = Signal::new("cust-1", "payment_failed")
        .with_confidence(0.9)
        .with_attribute("amount", json!(20));
    let outcome = h.processor.process(&small, &customer()).await.unwrap();

    assert!(outcome.created_run.is_none());
    assert_eq!(outcome.evaluations.len(), 1);
    assert!(!outcome.evaluations[0].would_trigger);
    assert!(h.conflicts.list_for_customer("cust-1").await.unwrap().is_empty());
}
