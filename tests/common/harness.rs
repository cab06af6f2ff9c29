//! Wiring of the core components against the in-memory store and fakes.

#![allow(dead_code)]

use indexmap::IndexMap;
use std::sync::Arc;
use uuid::Uuid;

use cbas_core::config::{EngineConfig, PollingConfig, SubmissionConfig};
use cbas_core::models::{RunSet, WorkflowInputDefinition, WorkflowOutputDefinition};
use cbas_core::monitoring::{SmartRunSetsPoller, SmartRunsPoller};
use cbas_core::orchestration::{
    RunCompletionHandler, RunSetAbortManager, SubmissionOrchestrator, SubmissionRequest,
};
use cbas_core::state_machine::{CbasRunSetStatus, CbasRunStatus};
use cbas_core::test_helpers::{
    self, InMemoryRunStore, MockExecutionEngine, MockRecordSink, MockRecordSource,
};

pub struct TestHarness {
    pub store: Arc<InMemoryRunStore>,
    pub engine: MockExecutionEngine,
    pub records: MockRecordSource,
    pub sink: MockRecordSink,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryRunStore::new()),
            engine: MockExecutionEngine::new(),
            records: MockRecordSource::new(),
            sink: MockRecordSink::new(),
        }
    }

    pub fn orchestrator(&self, max_workflows_in_batch: usize) -> SubmissionOrchestrator {
        let submission = SubmissionConfig {
            max_workflows_in_batch,
            ..SubmissionConfig::default()
        };
        let engine_config = EngineConfig {
            final_workflow_log_dir: Some("gs://bucket/logs".to_string()),
            ..EngineConfig::default()
        };
        SubmissionOrchestrator::new(
            self.store.clone(),
            Arc::new(self.engine.clone()),
            Arc::new(self.records.clone()),
            &submission,
            &engine_config,
        )
    }

    pub fn completion_handler(&self) -> Arc<RunCompletionHandler> {
        Arc::new(RunCompletionHandler::new(
            self.store.clone(),
            Arc::new(self.engine.clone()),
            Arc::new(self.sink.clone()),
        ))
    }

    pub fn run_sets_poller(&self, polling: &PollingConfig) -> SmartRunSetsPoller {
        let runs_poller = SmartRunsPoller::new(
            self.store.clone(),
            Arc::new(self.engine.clone()),
            self.completion_handler(),
            polling,
        );
        SmartRunSetsPoller::new(self.store.clone(), runs_poller, polling)
    }

    pub fn abort_manager(&self) -> RunSetAbortManager {
        RunSetAbortManager::new(self.store.clone(), Arc::new(self.engine.clone()))
    }

    /// Store a run set with one run per record, in the given status.
    pub fn seed_run_set(
        &self,
        status: CbasRunSetStatus,
        record_ids: &[&str],
        run_status: CbasRunStatus,
        inputs: &[WorkflowInputDefinition],
        outputs: &[WorkflowOutputDefinition],
    ) -> (RunSet, IndexMap<String, Uuid>) {
        let method_version = test_helpers::method_version();
        let run_set =
            test_helpers::run_set(method_version.method_version_id, status, inputs, outputs);
        self.store.insert_method_version(method_version);
        self.store.insert_run_set(run_set.clone());

        let mut run_ids = IndexMap::new();
        for record_id in record_ids {
            let engine_id = (run_status != CbasRunStatus::Queued).then(Uuid::new_v4);
            let run = test_helpers::run(run_set.run_set_id, record_id, run_status, engine_id);
            run_ids.insert(record_id.to_string(), run.run_id);
            self.store.insert_run(run);
        }
        (run_set, run_ids)
    }

    pub fn submission_request(
        &self,
        run_set: &RunSet,
        record_id_to_run_id: IndexMap<String, Uuid>,
        inputs: Vec<WorkflowInputDefinition>,
    ) -> SubmissionRequest {
        SubmissionRequest {
            run_set: run_set.clone(),
            workflow_url: test_helpers::TEST_WORKFLOW_URL.to_string(),
            record_id_to_run_id,
            input_definitions: inputs,
            token: test_helpers::test_token(),
        }
    }
}

/// Poll every due run on every pass.
pub fn eager_polling() -> PollingConfig {
    PollingConfig {
        min_seconds_between_run_status_polls: 0,
        ..PollingConfig::default()
    }
}
