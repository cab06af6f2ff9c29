//! Scriptable fakes for the engine and the record service.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

use crate::clients::{
    BearerToken, EngineError, EngineRunSummary, ExecutionEngine, RecordSink, RecordSource,
    RecordSourceError, WorkflowIdAndStatus,
};
use crate::models::{RecordAttributes, RecordResponse};
use crate::state_machine::EngineStatus;

/// One `submit_batch` call as the engine received it.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedBatch {
    pub workflow_url: String,
    pub inputs: IndexMap<Uuid, String>,
    pub workflow_options: String,
}

#[derive(Debug, Default)]
struct EngineState {
    submit_results: VecDeque<Result<(), EngineError>>,
    submitted: Vec<SubmittedBatch>,
    statuses: HashMap<Uuid, Result<Option<EngineStatus>, EngineError>>,
    outputs: HashMap<Uuid, Result<Map<String, Value>, EngineError>>,
    failure_messages: HashMap<Uuid, String>,
    cancel_failures: HashSet<Uuid>,
    canceled: Vec<Uuid>,
    status_queries: Vec<Uuid>,
    panic_on_submit: bool,
}

/// Accepts every batch unless a failure was queued with
/// [`MockExecutionEngine::push_submit_result`]. Accepted workflows are reported
/// as `Submitted`.
#[derive(Debug, Clone, Default)]
pub struct MockExecutionEngine {
    state: Arc<Mutex<EngineState>>,
}

impl MockExecutionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome of the next batch submission; consumed in order.
    pub fn push_submit_result(&self, result: Result<(), EngineError>) {
        self.state.lock().submit_results.push_back(result);
    }

    pub fn set_status(&self, engine_id: Uuid, status: EngineStatus) {
        self.state.lock().statuses.insert(engine_id, Ok(Some(status)));
    }

    pub fn set_status_error(&self, engine_id: Uuid, error: EngineError) {
        self.state.lock().statuses.insert(engine_id, Err(error));
    }

    pub fn set_outputs(&self, engine_id: Uuid, outputs: Map<String, Value>) {
        self.state.lock().outputs.insert(engine_id, Ok(outputs));
    }

    pub fn set_outputs_error(&self, engine_id: Uuid, error: EngineError) {
        self.state.lock().outputs.insert(engine_id, Err(error));
    }

    pub fn set_failure_message(&self, engine_id: Uuid, message: impl Into<String>) {
        self.state.lock().failure_messages.insert(engine_id, message.into());
    }

    /// Make every later `submit_batch` call panic.
    pub fn panic_on_submit(&self) {
        self.state.lock().panic_on_submit = true;
    }

    pub fn fail_cancel(&self, engine_id: Uuid) {
        self.state.lock().cancel_failures.insert(engine_id);
    }

    pub fn submitted_batches(&self) -> Vec<SubmittedBatch> {
        self.state.lock().submitted.clone()
    }

    pub fn canceled(&self) -> Vec<Uuid> {
        self.state.lock().canceled.clone()
    }

    pub fn status_queries(&self) -> Vec<Uuid> {
        self.state.lock().status_queries.clone()
    }
}

#[async_trait]
impl ExecutionEngine for MockExecutionEngine {
    async fn submit_batch(
        &self,
        workflow_url: &str,
        inputs: &IndexMap<Uuid, String>,
        workflow_options: &str,
        _token: &BearerToken,
    ) -> Result<Vec<WorkflowIdAndStatus>, EngineError> {
        let mut state = self.state.lock();
        if state.panic_on_submit {
            drop(state);
            panic!("scripted engine panic during batch submission");
        }
        state.submitted.push(SubmittedBatch {
            workflow_url: workflow_url.to_string(),
            inputs: inputs.clone(),
            workflow_options: workflow_options.to_string(),
        });

        state.submit_results.pop_front().unwrap_or(Ok(()))?;
        Ok(inputs
            .keys()
            .map(|id| WorkflowIdAndStatus {
                id: *id,
                status: EngineStatus::Submitted,
            })
            .collect())
    }

    async fn run_summary(&self, engine_id: Uuid) -> Result<Option<EngineRunSummary>, EngineError> {
        let mut state = self.state.lock();
        state.status_queries.push(engine_id);
        match state.statuses.get(&engine_id) {
            Some(Ok(status)) => Ok(Some(EngineRunSummary {
                id: engine_id,
                status: status.clone(),
                end: None,
            })),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(None),
        }
    }

    async fn outputs(&self, engine_id: Uuid) -> Result<Map<String, Value>, EngineError> {
        self.state
            .lock()
            .outputs
            .get(&engine_id)
            .cloned()
            .unwrap_or_else(|| Ok(Map::new()))
    }

    async fn failure_message(&self, engine_id: Uuid) -> Result<String, EngineError> {
        Ok(self
            .state
            .lock()
            .failure_messages
            .get(&engine_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn cancel(&self, engine_id: Uuid, _token: &BearerToken) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.cancel_failures.contains(&engine_id) {
            return Err(EngineError::Api {
                status: 500,
                message: format!("cannot abort {engine_id}"),
            });
        }
        state.canceled.push(engine_id);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecordSourceState {
    records: HashMap<String, RecordResponse>,
    failures: HashMap<String, RecordSourceError>,
    lookups: Vec<String>,
}

/// Serves records by id; unknown ids are `NotFound`.
#[derive(Debug, Clone, Default)]
pub struct MockRecordSource {
    state: Arc<Mutex<RecordSourceState>>,
}

impl MockRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = RecordResponse>) -> Self {
        let source = Self::new();
        for record in records {
            source.add_record(record);
        }
        source
    }

    pub fn add_record(&self, record: RecordResponse) {
        self.state.lock().records.insert(record.id.clone(), record);
    }

    pub fn fail_record(&self, record_id: impl Into<String>, error: RecordSourceError) {
        self.state.lock().failures.insert(record_id.into(), error);
    }

    pub fn lookups(&self) -> Vec<String> {
        self.state.lock().lookups.clone()
    }
}

#[async_trait]
impl RecordSource for MockRecordSource {
    async fn get_record(
        &self,
        record_type: &str,
        record_id: &str,
        _token: &BearerToken,
    ) -> Result<RecordResponse, RecordSourceError> {
        let mut state = self.state.lock();
        state.lookups.push(record_id.to_string());
        if let Some(error) = state.failures.get(record_id) {
            return Err(error.clone());
        }
        state
            .records
            .get(record_id)
            .cloned()
            .ok_or_else(|| RecordSourceError::NotFound {
                record_type: record_type.to_string(),
                record_id: record_id.to_string(),
            })
    }
}

/// A record attribute update as received by the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub record_type: String,
    pub record_id: String,
    pub attributes: RecordAttributes,
}

#[derive(Debug, Default)]
struct RecordSinkState {
    updates: Vec<RecordUpdate>,
    fail: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockRecordSink {
    state: Arc<Mutex<RecordSinkState>>,
}

impl MockRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.state.lock().fail = fail;
    }

    pub fn updates(&self) -> Vec<RecordUpdate> {
        self.state.lock().updates.clone()
    }
}

#[async_trait]
impl RecordSink for MockRecordSink {
    async fn update_record(
        &self,
        record_type: &str,
        record_id: &str,
        attributes: RecordAttributes,
    ) -> Result<(), RecordSourceError> {
        let mut state = self.state.lock();
        if state.fail {
            return Err(RecordSourceError::Transient("record service unavailable".to_string()));
        }
        state.updates.push(RecordUpdate {
            record_type: record_type.to_string(),
            record_id: record_id.to_string(),
            attributes,
        });
        Ok(())
    }
}
