//! Run set cancellation.

mod common;

use common::TestHarness;
use uuid::Uuid;

use cbas_core::error::CbasError;
use cbas_core::state_machine::{CbasRunSetStatus, CbasRunStatus};
use cbas_core::test_helpers::{default_inputs, run, test_token};

#[tokio::test]
async fn test_abort_cancels_every_unfinished_run() {
    let harness = TestHarness::new();
    let (run_set, run_ids) = harness.seed_run_set(
        CbasRunSetStatus::Running,
        &["FOO1", "FOO2"],
        CbasRunStatus::Running,
        &default_inputs(),
        &[],
    );
    let finished = run(run_set.run_set_id, "FOO3", CbasRunStatus::Complete, Some(Uuid::new_v4()));
    harness.store.insert_run(finished.clone());

    let details = harness
        .abort_manager()
        .abort(run_set.run_set_id, &test_token())
        .await
        .unwrap();

    assert_eq!(details.submitted.len(), 2);
    assert!(details.failed.is_empty());
    assert!(!details.submitted.contains(&finished.run_id));
    assert_eq!(harness.engine.canceled().len(), 2);

    for run_id in run_ids.values() {
        assert_eq!(harness.store.run(*run_id).unwrap().status, CbasRunStatus::Canceling);
    }
    assert_eq!(harness.store.run(finished.run_id).unwrap().status, CbasRunStatus::Complete);
    assert_eq!(
        harness.store.run_set(run_set.run_set_id).unwrap().status,
        CbasRunSetStatus::Canceling
    );
}

#[tokio::test]
async fn test_per_run_cancel_failure_does_not_stop_others() {
    let harness = TestHarness::new();
    let (run_set, run_ids) = harness.seed_run_set(
        CbasRunSetStatus::Running,
        &["FOO1", "FOO2"],
        CbasRunStatus::Running,
        &default_inputs(),
        &[],
    );
    let stuck = harness.store.run(run_ids["FOO1"]).unwrap();
    harness.engine.fail_cancel(stuck.engine_id.unwrap());

    let details = harness
        .abort_manager()
        .abort(run_set.run_set_id, &test_token())
        .await
        .unwrap();

    assert_eq!(details.failed, vec![stuck.run_id]);
    assert_eq!(details.submitted, vec![run_ids["FOO2"]]);

    let stored = harness.store.run(stuck.run_id).unwrap();
    assert_eq!(stored.status, CbasRunStatus::Running);
    assert_eq!(
        stored.error_messages,
        Some(format!("Unable to abort workflow {}.", stuck.run_id))
    );
}

#[tokio::test]
async fn test_abort_unknown_run_set_is_not_found() {
    let harness = TestHarness::new();
    let result = harness.abort_manager().abort(Uuid::new_v4(), &test_token()).await;
    assert!(matches!(result, Err(CbasError::NotFound(_))));
}

#[tokio::test]
async fn test_canceled_runs_settle_through_reconciliation() {
    use cbas_core::state_machine::EngineStatus;

    let harness = TestHarness::new();
    let (run_set, run_ids) = harness.seed_run_set(
        CbasRunSetStatus::Running,
        &["FOO1"],
        CbasRunStatus::Running,
        &default_inputs(),
        &[],
    );
    harness
        .abort_manager()
        .abort(run_set.run_set_id, &test_token())
        .await
        .unwrap();

    let engine_id = harness.store.run(run_ids["FOO1"]).unwrap().engine_id.unwrap();
    harness.engine.set_status(engine_id, EngineStatus::Aborted);
    harness
        .run_sets_poller(&common::eager_polling())
        .reconcile_all()
        .await
        .unwrap();

    assert_eq!(
        harness.store.run(run_ids["FOO1"]).unwrap().status,
        CbasRunStatus::Canceled
    );
    assert_eq!(
        harness.store.run_set(run_set.run_set_id).unwrap().status,
        CbasRunSetStatus::Canceled
    );
}

#[tokio::test]
async fn test_aborted_run_set_stays_canceling_while_runs_are_unfinished() {
    use cbas_core::state_machine::EngineStatus;

    let harness = TestHarness::new();
    let (run_set, run_ids) = harness.seed_run_set(
        CbasRunSetStatus::Running,
        &["FOO1"],
        CbasRunStatus::Running,
        &default_inputs(),
        &[],
    );
    let engine_id = harness.store.run(run_ids["FOO1"]).unwrap().engine_id.unwrap();
    harness.engine.fail_cancel(engine_id);
    harness.engine.set_status(engine_id, EngineStatus::Running);

    let details = harness
        .abort_manager()
        .abort(run_set.run_set_id, &test_token())
        .await
        .unwrap();
    assert_eq!(details.failed, vec![run_ids["FOO1"]]);

    let poller = harness.run_sets_poller(&common::eager_polling());
    poller.reconcile_all().await.unwrap();
    assert_eq!(
        harness.store.run_set(run_set.run_set_id).unwrap().status,
        CbasRunSetStatus::Canceling
    );

    harness.engine.set_status(engine_id, EngineStatus::Succeeded);
    poller.reconcile_all().await.unwrap();
    assert_eq!(
        harness.store.run(run_ids["FOO1"]).unwrap().status,
        CbasRunStatus::Complete
    );
    assert_eq!(
        harness.store.run_set(run_set.run_set_id).unwrap().status,
        CbasRunSetStatus::Complete
    );
}
