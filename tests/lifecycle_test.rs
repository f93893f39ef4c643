//! Guarded run transitions and the snooze/requeue cycle against a real
//! SQLite store.

use std::sync::Arc;

use chrono::Utc;
use reclaim::adapters::sqlite::{create_migrated_test_pool, SqlitePlaybookRepository, SqliteRunRepository};
use reclaim::domain::models::{
    ActionType, CompareOp, ConditionNode, DecisionSummary, Playbook, PlaybookRun, PlaybookStatus,
    RunStatus,
};
use reclaim::domain::ports::{PlaybookRepository, RunRepository};
use reclaim::services::RunLifecycleService;
use serde_json::json;

async fn setup() -> (Arc<SqliteRunRepository>, RunLifecycleService, Playbook) {
    let pool = create_migrated_test_pool().await.expect("test pool");
    let playbooks = SqlitePlaybookRepository::new(pool.clone());
    let runs = Arc::new(SqliteRunRepository::new(pool));

    let playbook = Playbook::new(
        "Churn outreach",
        "usage_drop",
        ConditionNode::Compare {
            field: "drop_pct".to_string(),
            operator: CompareOp::GreaterThan,
            value: json!(30),
        },
    )
    .with_status(PlaybookStatus::Active)
    .with_action(ActionType::CrmTask, json!({"title": "Call the champion"}));
    playbooks.create(&playbook).await.expect("seed playbook");

    let lifecycle = RunLifecycleService::new(runs.clone(), 3);
    (runs, lifecycle, playbook)
}

async fn seed_run(runs: &SqliteRunRepository, playbook: &Playbook) -> PlaybookRun {
    let run = PlaybookRun::from_playbook(
        playbook,
        "cust-7",
        0.8,
        500.0,
        "Churn outreach triggered by usage_drop",
        DecisionSummary::default(),
        3,
    );
    runs.create(&run).await.expect("seed run");
    run
}

#[tokio::test]
async fn test_approve_is_guarded_against_duplicate_requests() {
    let (runs, lifecycle, playbook) = setup().await;
    let run = seed_run(&runs, &playbook).await;

    let approved = lifecycle.approve(run.id).await.unwrap();
    assert_eq!(approved.status, RunStatus::Approved);
    assert!(approved.approved_at.is_some());

    // A duplicated approve no longer finds a Pending run.
    let err = lifecycle.approve(run.id).await.unwrap_err();
    assert!(err.is_conflict());

    let stored = lifecycle.get(run.id).await.unwrap();
    assert_eq!(stored.status, RunStatus::Approved);
}

#[tokio::test]
async fn test_snooze_and_requeue_expired() {
    let (runs, lifecycle, playbook) = setup().await;
    let run = seed_run(&runs, &playbook).await;

    let snoozed = lifecycle.snooze(run.id, 0).await.unwrap();
    assert_eq!(snoozed.status, RunStatus::Snoozed);
    assert!(snoozed.snoozed_until.is_some());

    let requeued = lifecycle.requeue_expired_snoozes(Utc::now()).await.unwrap();
    assert_eq!(requeued, 1);

    let stored = lifecycle.get(run.id).await.unwrap();
    assert_eq!(stored.status, RunStatus::Pending);

    // Nothing left to requeue on the next sweep.
    let again = lifecycle.requeue_expired_snoozes(Utc::now()).await.unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn test_future_snooze_is_not_requeued() {
    let (runs, lifecycle, playbook) = setup().await;
    let run = seed_run(&runs, &playbook).await;

    lifecycle.snooze(run.id, 48).await.unwrap();
    let requeued = lifecycle.requeue_expired_snoozes(Utc::now()).await.unwrap();
    assert_eq!(requeued, 0);

    let stored = lifecycle.get(run.id).await.unwrap();
    assert_eq!(stored.status, RunStatus::Snoozed);
}

#[tokio::test]
async fn test_undismiss_returns_run_to_failed() {
    let (runs, lifecycle, playbook) = setup().await;
    let mut run = seed_run(&runs, &playbook).await;

    // Walk the run to Failed, then dismiss it.
    for status in [RunStatus::Approved, RunStatus::Executing, RunStatus::Failed] {
        let expected = run.status;
        run.transition_to(status).unwrap();
        runs.update_guarded(&run, expected).await.unwrap();
    }
    lifecycle.dismiss(run.id).await.unwrap();

    let restored = lifecycle.undismiss(run.id).await.unwrap();
    assert_eq!(restored.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_completed_run_rejects_further_transitions() {
    let (runs, lifecycle, playbook) = setup().await;
    let mut run = seed_run(&runs, &playbook).await;

    for status in [RunStatus::Approved, RunStatus::Executing, RunStatus::Completed] {
        let expected = run.status;
        run.transition_to(status).unwrap();
        runs.update_guarded(&run, expected).await.unwrap();
    }

    let err = lifecycle.dismiss(run.id).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_escalated_run_can_still_be_approved() {
    let (runs, lifecycle, playbook) = setup().await;
    let run = seed_run(&runs, &playbook).await;

    lifecycle.escalate(run.id).await.unwrap();
    let approved = lifecycle.approve(run.id).await.unwrap();
    assert_eq!(approved.status, RunStatus::Approved);
}
