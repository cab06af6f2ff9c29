//! Run set registration through the worker pool.

mod common;

use common::TestHarness;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use cbas_core::config::SubmissionConfig;
use cbas_core::error::CbasError;
use cbas_core::execution::SubmissionWorkerPool;
use cbas_core::orchestration::{RecordSelection, RunSetRequest, RunSetsService};
use cbas_core::state_machine::{CbasRunSetStatus, CbasRunStatus};
use cbas_core::test_helpers::{default_inputs, method_version, record, test_token};
use uuid::Uuid;

fn service(harness: &TestHarness, max_record_ids: usize) -> RunSetsService {
    let config = SubmissionConfig {
        max_record_ids,
        ..SubmissionConfig::default()
    };
    service_with_pool(harness, Arc::new(SubmissionWorkerPool::new(&config)), max_record_ids)
}

fn service_with_pool(
    harness: &TestHarness,
    pool: Arc<SubmissionWorkerPool>,
    max_record_ids: usize,
) -> RunSetsService {
    RunSetsService::new(
        harness.store.clone(),
        Arc::new(harness.orchestrator(10)),
        pool,
        harness.abort_manager(),
        max_record_ids,
    )
}

fn request(method_version_id: Uuid, record_ids: &[&str]) -> RunSetRequest {
    RunSetRequest {
        run_set_name: Some("hello".to_string()),
        run_set_description: None,
        method_version_id,
        call_caching_enabled: None,
        records: RecordSelection {
            record_type: "FOO".to_string(),
            record_ids: record_ids.iter().map(|id| id.to_string()).collect(),
        },
        workflow_input_definitions: default_inputs(),
        workflow_output_definitions: vec![],
        user_id: Some("user@example.com".to_string()),
        original_workspace_id: None,
    }
}

async fn wait_for_status(harness: &TestHarness, run_set_id: Uuid, status: CbasRunSetStatus) {
    for _ in 0..100 {
        if harness.store.run_set(run_set_id).map(|rs| rs.status) == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run set {run_set_id} never reached {status}");
}

#[tokio::test]
async fn test_submit_registers_runs_and_dispatches_submission() {
    let harness = TestHarness::new();
    let version = method_version();
    harness.store.insert_method_version(version.clone());
    harness.records.add_record(record("FOO1", json!({"foo_name": "a"})));
    harness.records.add_record(record("FOO2", json!({"foo_name": "b"})));

    let response = service(&harness, 10)
        .submit_run_set(request(version.method_version_id, &["FOO1", "FOO2"]), test_token())
        .await
        .unwrap();

    assert_eq!(response.state, CbasRunSetStatus::Queued);
    assert_eq!(response.runs.len(), 2);
    assert!(response.runs.iter().all(|r| r.state == CbasRunStatus::Queued));

    wait_for_status(&harness, response.run_set_id, CbasRunSetStatus::Running).await;
    let stored = harness.store.run_set(response.run_set_id).unwrap();
    assert!(stored.call_caching_enabled);
    assert_eq!(stored.run_count, 2);
    assert!(harness
        .store
        .runs_for(response.run_set_id)
        .iter()
        .all(|run| run.status == CbasRunStatus::Initializing && run.engine_id.is_some()));
}

#[tokio::test]
async fn test_submit_rejects_invalid_record_selections() {
    let harness = TestHarness::new();
    let version = method_version();
    harness.store.insert_method_version(version.clone());
    let service = service(&harness, 2);

    let empty = service
        .submit_run_set(request(version.method_version_id, &[]), test_token())
        .await;
    assert!(matches!(empty, Err(CbasError::ValidationError(_))));

    let too_many = service
        .submit_run_set(request(version.method_version_id, &["A", "B", "C"]), test_token())
        .await;
    assert!(matches!(too_many, Err(CbasError::ValidationError(_))));

    let duplicates = service
        .submit_run_set(request(version.method_version_id, &["A", "A"]), test_token())
        .await;
    assert!(matches!(duplicates, Err(CbasError::ValidationError(m)) if m.contains("A")));
}

#[tokio::test]
async fn test_submit_unknown_method_version_is_not_found() {
    let harness = TestHarness::new();
    let result = service(&harness, 10)
        .submit_run_set(request(Uuid::new_v4(), &["FOO1"]), test_token())
        .await;
    assert!(matches!(result, Err(CbasError::NotFound(_))));
}

#[tokio::test]
async fn test_dispatch_failure_fails_registered_run_set() {
    let harness = TestHarness::new();
    let version = method_version();
    harness.store.insert_method_version(version.clone());
    harness.records.add_record(record("FOO1", json!({"foo_name": "a"})));

    let pool = Arc::new(SubmissionWorkerPool::new(&SubmissionConfig::default()));
    pool.shutdown().await;
    let result = service_with_pool(&harness, pool, 10)
        .submit_run_set(request(version.method_version_id, &["FOO1"]), test_token())
        .await;

    assert!(matches!(result, Err(CbasError::WorkerPoolError(_))));
    let run_sets = harness.store.run_sets();
    assert_eq!(run_sets.len(), 1);
    let stored = &run_sets[0];
    assert_eq!(stored.status, CbasRunSetStatus::Error);
    assert_eq!(stored.run_count, 1);
    assert_eq!(stored.error_count, 1);

    let runs = harness.store.runs_for(stored.run_set_id);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, CbasRunStatus::SystemError);
    assert!(runs[0]
        .error_messages
        .as_deref()
        .unwrap()
        .contains("Unable to dispatch submission"));
    assert!(harness.engine.submitted_batches().is_empty());
}

#[tokio::test]
async fn test_panicking_submission_fails_run_set() {
    let harness = TestHarness::new();
    let version = method_version();
    harness.store.insert_method_version(version.clone());
    harness.records.add_record(record("FOO1", json!({"foo_name": "a"})));
    harness.engine.panic_on_submit();

    let response = service(&harness, 10)
        .submit_run_set(request(version.method_version_id, &["FOO1"]), test_token())
        .await
        .unwrap();

    wait_for_status(&harness, response.run_set_id, CbasRunSetStatus::Error).await;
    let runs = harness.store.runs_for(response.run_set_id);
    assert_eq!(runs[0].status, CbasRunStatus::SystemError);
    assert!(runs[0]
        .error_messages
        .as_deref()
        .unwrap()
        .contains("terminated unexpectedly"));
}
