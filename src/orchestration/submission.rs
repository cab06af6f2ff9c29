//! # Submission Orchestrator
//!
//! Turns a registered run set (one QUEUED run per record) into engine workflows.
//!
//! ## Flow
//!
//! 1. Fetch every record. Any failure fails the whole run set before anything is
//!    sent to the engine.
//! 2. Split the records into batches of at most `max_workflows_in_batch`.
//! 3. Build each record's inputs; a record whose inputs cannot be built fails its
//!    own run and is left out of the batch.
//! 4. Submit each batch in one engine call. Accepted runs become INITIALIZING with
//!    their engine id; a rejected batch fails all of its runs.
//! 5. Persist the run set's status and counts.
//!
//! The run set is re-read before every batch. Once it has been aborted, the
//! remaining runs are canceled without reaching the engine, and only runs that
//! are still QUEUED are ever submitted. The final run set write applies only
//! while the set is QUEUED, so an abort is never overwritten.
//!
//! Each run write is independent. A failed write is logged and the reconciler
//! converges the state later; submission itself never retries.

use chrono::Utc;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::inputs::{build_inputs, inputs_to_json, InputError};
use super::types::RunStateResponse;
use crate::clients::{BearerToken, ExecutionEngine, RecordSource, WorkflowOptions};
use crate::config::{EngineConfig, SubmissionConfig};
use crate::database::RunStore;
use crate::logging::{log_error, log_run_set_operation};
use crate::models::{RecordResponse, RunSet, RunsFilter, WorkflowInputDefinition};
use crate::state_machine::{CbasRunSetStatus, CbasRunStatus};

/// Everything needed to submit one run set.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub run_set: RunSet,
    /// Resolved workflow document URL
    pub workflow_url: String,
    /// Record id to run id, in request order
    pub record_id_to_run_id: IndexMap<String, Uuid>,
    pub input_definitions: Vec<WorkflowInputDefinition>,
    pub token: BearerToken,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    pub run_set_id: Uuid,
    pub run_states: Vec<RunStateResponse>,
    pub run_set_status: CbasRunSetStatus,
    pub run_count: i32,
    pub error_count: i32,
    /// Run id to engine id, for runs the engine accepted
    pub engine_ids: IndexMap<Uuid, Uuid>,
}

pub struct SubmissionOrchestrator {
    store: Arc<dyn RunStore>,
    engine: Arc<dyn ExecutionEngine>,
    records: Arc<dyn RecordSource>,
    max_workflows_in_batch: usize,
    final_workflow_log_dir: Option<String>,
}

impl SubmissionOrchestrator {
    pub fn new(
        store: Arc<dyn RunStore>,
        engine: Arc<dyn ExecutionEngine>,
        records: Arc<dyn RecordSource>,
        submission_config: &SubmissionConfig,
        engine_config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            engine,
            records,
            max_workflows_in_batch: submission_config.max_workflows_in_batch.max(1),
            final_workflow_log_dir: engine_config.final_workflow_log_dir.clone(),
        }
    }

    #[instrument(skip_all, fields(run_set_id = %request.run_set.run_set_id))]
    pub async fn submit(&self, request: SubmissionRequest) -> SubmissionOutcome {
        let run_set_id = request.run_set.run_set_id;
        let total = request.record_id_to_run_id.len();
        log_run_set_operation("submit", run_set_id, "STARTED", None);

        let (records, fetch_failures) = self.fetch_records(&request).await;
        if !fetch_failures.is_empty() {
            let failures = fetch_failures
                .iter()
                .map(|(record_id, reason)| format!("{record_id}={reason}"))
                .collect::<Vec<_>>()
                .join(", ");
            let message =
                format!("Error while fetching WDS Records for Record ID(s): {{{failures}}}");
            return self.fail_submission(&request, &message).await;
        }

        let options = WorkflowOptions::new(
            self.final_workflow_log_dir.clone(),
            request.run_set.call_caching_enabled,
        );
        let options_json = match options.to_json() {
            Ok(json) => json,
            Err(e) => {
                let message =
                    format!("Failed to build workflow options for RunSet {run_set_id}: {e}");
                return self.fail_submission(&request, &message).await;
            }
        };

        let mut run_states = Vec::with_capacity(total);
        let mut engine_ids = IndexMap::new();
        let mut aborted = false;
        for (batch_index, batch) in records.chunks(self.max_workflows_in_batch).enumerate() {
            if !aborted {
                match self.batch_gate(run_set_id).await {
                    BatchGate::Submit(queued) => {
                        debug!(batch_index, batch_size = batch.len(), "Preparing submission batch");
                        self.submit_batch(
                            &request,
                            batch,
                            queued.as_ref(),
                            &options_json,
                            &mut run_states,
                            &mut engine_ids,
                        )
                        .await;
                        continue;
                    }
                    BatchGate::Aborted => {
                        info!(
                            run_set_id = %run_set_id,
                            batch_index,
                            "Run set aborted during submission"
                        );
                        aborted = true;
                    }
                }
            }
            self.cancel_unsubmitted(&request, batch, &mut run_states).await;
        }

        let run_count = run_states.len();
        let error_count = run_states.iter().filter(|s| s.state.in_error_state()).count();
        let run_set_status = if aborted {
            CbasRunSetStatus::Canceling
        } else if run_count == 0 {
            CbasRunSetStatus::Complete
        } else if error_count == run_count {
            CbasRunSetStatus::Error
        } else {
            CbasRunSetStatus::Running
        };

        let outcome = SubmissionOutcome {
            run_set_id,
            run_states,
            run_set_status,
            run_count: to_count(run_count),
            error_count: to_count(error_count),
            engine_ids,
        };
        self.persist_run_set(&outcome).await;

        info!(
            run_set_id = %run_set_id,
            status = %outcome.run_set_status,
            run_count = outcome.run_count,
            error_count = outcome.error_count,
            "Run set submission complete"
        );
        outcome
    }

    async fn fetch_records(
        &self,
        request: &SubmissionRequest,
    ) -> (Vec<RecordResponse>, IndexMap<String, String>) {
        let record_type = &request.run_set.record_type;
        let mut records = Vec::with_capacity(request.record_id_to_run_id.len());
        let mut failures = IndexMap::new();

        for record_id in request.record_id_to_run_id.keys() {
            match self
                .records
                .get_record(record_type, record_id, &request.token)
                .await
            {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(record_id = %record_id, error = %e, "Record lookup failed");
                    failures.insert(record_id.clone(), e.to_string());
                }
            }
        }
        (records, failures)
    }

    /// Decide whether the next batch may go to the engine, and which runs are
    /// still QUEUED. Read failures fall back to submitting.
    async fn batch_gate(&self, run_set_id: Uuid) -> BatchGate {
        match self.store.get_run_set(run_set_id).await {
            Ok(Some(run_set))
                if matches!(
                    run_set.status,
                    CbasRunSetStatus::Canceling | CbasRunSetStatus::Canceled
                ) =>
            {
                return BatchGate::Aborted;
            }
            Ok(_) => {}
            Err(e) => log_error(
                "submission",
                "get_run_set",
                &e.to_string(),
                Some(&run_set_id.to_string()),
            ),
        }

        let queued = RunsFilter::for_run_set(run_set_id).with_statuses([CbasRunStatus::Queued]);
        match self.store.get_runs(&queued).await {
            Ok(runs) => BatchGate::Submit(Some(runs.into_iter().map(|run| run.run_id).collect())),
            Err(e) => {
                log_error("submission", "get_runs", &e.to_string(), Some(&run_set_id.to_string()));
                BatchGate::Submit(None)
            }
        }
    }

    /// Cancel the runs of a batch that will not be submitted because the run set
    /// was aborted.
    async fn cancel_unsubmitted(
        &self,
        request: &SubmissionRequest,
        batch: &[RecordResponse],
        run_states: &mut Vec<RunStateResponse>,
    ) {
        let message = format!(
            "RunSet {} was aborted before this run was submitted.",
            request.run_set.run_set_id
        );
        for record in batch {
            let Some(&run_id) = request.record_id_to_run_id.get(&record.id) else {
                continue;
            };
            match self
                .store
                .update_run_status_with_error(run_id, CbasRunStatus::Canceled, Utc::now(), &message)
                .await
            {
                Ok(0) => debug!(run_id = %run_id, "Run already finished, not canceling"),
                Ok(_) => debug!(run_id = %run_id, "Unsubmitted run CANCELED"),
                Err(e) => log_error(
                    "submission",
                    "cancel_unsubmitted",
                    &e.to_string(),
                    Some(&run_id.to_string()),
                ),
            }
            run_states.push(RunStateResponse::canceled(run_id, message.as_str()));
        }
    }

    async fn submit_batch(
        &self,
        request: &SubmissionRequest,
        batch: &[RecordResponse],
        queued: Option<&HashSet<Uuid>>,
        options_json: &str,
        run_states: &mut Vec<RunStateResponse>,
        engine_ids: &mut IndexMap<Uuid, Uuid>,
    ) {
        let run_set_id = request.run_set.run_set_id;
        let mut workflow_inputs: IndexMap<Uuid, String> = IndexMap::with_capacity(batch.len());
        let mut engine_to_run: IndexMap<Uuid, Uuid> = IndexMap::with_capacity(batch.len());

        for record in batch {
            let Some(&run_id) = request.record_id_to_run_id.get(&record.id) else {
                warn!(record_id = %record.id, "Fetched record has no run in this run set");
                continue;
            };
            if queued.is_some_and(|queued| !queued.contains(&run_id)) {
                debug!(run_id = %run_id, "Run is no longer QUEUED, not submitting it");
                continue;
            }

            match build_inputs(&request.input_definitions, record)
                .and_then(|inputs| inputs_to_json(&inputs))
            {
                Ok(document) => {
                    let engine_id = Uuid::new_v4();
                    workflow_inputs.insert(engine_id, document);
                    engine_to_run.insert(engine_id, run_id);
                }
                Err(InputError::Coercion(e)) => {
                    let message = format!(
                        "Input generation failed for record {}. Coercion error: {e}",
                        record.id
                    );
                    run_states.push(self.record_failure(run_id, &message).await);
                }
                Err(e) => {
                    let message = format!("Input generation failed for record {}. {e}", record.id);
                    run_states.push(self.record_failure(run_id, &message).await);
                }
            }
        }

        if workflow_inputs.is_empty() {
            return;
        }

        match self
            .engine
            .submit_batch(&request.workflow_url, &workflow_inputs, options_json, &request.token)
            .await
        {
            Ok(accepted) => {
                for workflow in accepted {
                    match engine_to_run.shift_remove(&workflow.id) {
                        Some(run_id) => {
                            run_states.push(self.record_initializing(run_id, workflow.id).await);
                            engine_ids.insert(run_id, workflow.id);
                        }
                        None => warn!(
                            engine_id = %workflow.id,
                            "Engine returned a workflow id that was not requested"
                        ),
                    }
                }
                for run_id in engine_to_run.into_values() {
                    let message = format!(
                        "Workflow was not accepted by the engine in batch submission for RunSet {run_set_id}."
                    );
                    run_states.push(self.record_failure(run_id, &message).await);
                }
            }
            Err(e) => {
                let message =
                    format!("Workflow submission failed for batch in RunSet {run_set_id}. {e}");
                log_error("submission", "submit_batch", &e.to_string(), Some(&message));
                for run_id in engine_to_run.into_values() {
                    run_states.push(self.record_failure(run_id, &message).await);
                }
            }
        }
    }

    /// Fail every still-queued run and, while it is still QUEUED, the run set
    /// itself. Used when the submission cannot proceed at all.
    pub async fn fail_submission(
        &self,
        request: &SubmissionRequest,
        message: &str,
    ) -> SubmissionOutcome {
        let run_set_id = request.run_set.run_set_id;
        warn!(
            run_set_id = %run_set_id,
            error = %message,
            "Failing run set before engine submission"
        );

        let queued = RunsFilter::for_run_set(run_set_id).with_statuses([CbasRunStatus::Queued]);
        let run_ids: Vec<Uuid> = match self.store.get_runs(&queued).await {
            Ok(runs) => runs.into_iter().map(|run| run.run_id).collect(),
            Err(e) => {
                warn!(error = %e, "Could not list queued runs, failing every requested run");
                request.record_id_to_run_id.values().copied().collect()
            }
        };

        let mut run_states = Vec::with_capacity(run_ids.len());
        for run_id in run_ids {
            run_states.push(self.record_failure(run_id, message).await);
        }

        let total = to_count(request.record_id_to_run_id.len());
        let outcome = SubmissionOutcome {
            run_set_id,
            run_states,
            run_set_status: CbasRunSetStatus::Error,
            run_count: total,
            error_count: total,
            engine_ids: IndexMap::new(),
        };
        self.persist_run_set(&outcome).await;
        outcome
    }

    async fn record_failure(&self, run_id: Uuid, message: &str) -> RunStateResponse {
        match self
            .store
            .update_run_status_with_error(run_id, CbasRunStatus::SystemError, Utc::now(), message)
            .await
        {
            Ok(0) => warn!(run_id = %run_id, "Zero rows updated while marking run SYSTEM_ERROR"),
            Ok(_) => debug!(run_id = %run_id, "Run marked SYSTEM_ERROR"),
            Err(e) => log_error(
                "submission",
                "record_failure",
                &e.to_string(),
                Some(&run_id.to_string()),
            ),
        }
        RunStateResponse::failed(run_id, message)
    }

    async fn record_initializing(&self, run_id: Uuid, engine_id: Uuid) -> RunStateResponse {
        match self
            .store
            .update_engine_id_and_status(run_id, engine_id, CbasRunStatus::Initializing, Utc::now())
            .await
        {
            Ok(0) => warn!(
                run_id = %run_id,
                engine_id = %engine_id,
                "Zero rows updated while recording engine id"
            ),
            Ok(_) => debug!(run_id = %run_id, engine_id = %engine_id, "Run INITIALIZING"),
            Err(e) => log_error(
                "submission",
                "record_initializing",
                &e.to_string(),
                Some(&run_id.to_string()),
            ),
        }
        RunStateResponse::new(run_id, CbasRunStatus::Initializing)
    }

    async fn persist_run_set(&self, outcome: &SubmissionOutcome) {
        let result = self
            .store
            .update_queued_run_set_state_and_counts(
                outcome.run_set_id,
                outcome.run_set_status,
                outcome.run_count,
                outcome.error_count,
                Utc::now(),
            )
            .await;

        match result {
            Ok(0) => warn!(
                run_set_id = %outcome.run_set_id,
                "Run set is no longer QUEUED, leaving its status to reconciliation"
            ),
            Ok(_) => log_run_set_operation(
                "submit",
                outcome.run_set_id,
                outcome.run_set_status.as_str(),
                None,
            ),
            Err(e) => log_error(
                "submission",
                "persist_run_set",
                &e.to_string(),
                Some(&outcome.run_set_id.to_string()),
            ),
        }
    }
}

enum BatchGate {
    /// Submit; `None` when the QUEUED runs could not be listed
    Submit(Option<HashSet<Uuid>>),
    Aborted,
}

fn to_count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
