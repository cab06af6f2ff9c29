//! # Run Sets Service
//!
//! Entry point for registering a run set and for aborting one.
//!
//! Registration validates the request, stores the run set and one QUEUED run per
//! record, and hands the submission to the worker pool. The response is returned
//! with every run still QUEUED; the submission outcome is observed through the
//! store.
//!
//! The reconciler does not visit QUEUED run sets, so a submission that cannot be
//! dispatched, or that panics on its worker, fails the run set here.

use chrono::Utc;
use futures::FutureExt;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::abort::RunSetAbortManager;
use super::submission::{SubmissionOrchestrator, SubmissionRequest};
use super::types::{AbortRequestDetails, RunSetRequest, RunSetSubmissionResponse, RunStateResponse};
use crate::clients::BearerToken;
use crate::database::RunStore;
use crate::error::{CbasError, Result};
use crate::execution::SubmissionWorkerPool;
use crate::logging::log_run_set_operation;
use crate::models::{Run, RunSet};
use crate::state_machine::{CbasRunSetStatus, CbasRunStatus};

pub struct RunSetsService {
    store: Arc<dyn RunStore>,
    orchestrator: Arc<SubmissionOrchestrator>,
    worker_pool: Arc<SubmissionWorkerPool>,
    abort_manager: RunSetAbortManager,
    max_record_ids: usize,
}

impl RunSetsService {
    pub fn new(
        store: Arc<dyn RunStore>,
        orchestrator: Arc<SubmissionOrchestrator>,
        worker_pool: Arc<SubmissionWorkerPool>,
        abort_manager: RunSetAbortManager,
        max_record_ids: usize,
    ) -> Self {
        Self {
            store,
            orchestrator,
            worker_pool,
            abort_manager,
            max_record_ids,
        }
    }

    #[instrument(skip_all, fields(method_version_id = %request.method_version_id))]
    pub async fn submit_run_set(
        &self,
        request: RunSetRequest,
        token: BearerToken,
    ) -> Result<RunSetSubmissionResponse> {
        self.validate(&request)?;

        let method_version = self
            .store
            .get_method_version(request.method_version_id)
            .await?
            .ok_or_else(|| {
                CbasError::NotFound(format!(
                    "Method version {} not found",
                    request.method_version_id
                ))
            })?;

        let now = Utc::now();
        let run_set = RunSet {
            run_set_id: Uuid::new_v4(),
            method_version_id: method_version.method_version_id,
            name: request.run_set_name.clone(),
            description: request.run_set_description.clone(),
            call_caching_enabled: request.call_caching_enabled.unwrap_or(true),
            is_template: false,
            status: CbasRunSetStatus::Queued,
            submission_timestamp: now,
            last_modified_timestamp: now,
            last_polled_timestamp: now,
            run_count: 0,
            error_count: 0,
            input_definition: serde_json::to_string(&request.workflow_input_definitions)?,
            output_definition: serde_json::to_string(&request.workflow_output_definitions)?,
            record_type: request.records.record_type.clone(),
            user_id: request.user_id.clone(),
            original_workspace_id: request.original_workspace_id,
        };
        self.store.create_run_set(&run_set).await?;

        let mut record_id_to_run_id = IndexMap::with_capacity(request.records.record_ids.len());
        for record_id in &request.records.record_ids {
            let run = Run::queued(Uuid::new_v4(), run_set.run_set_id, record_id.clone());
            self.store.create_run(&run).await?;
            record_id_to_run_id.insert(record_id.clone(), run.run_id);
        }

        let run_count = i32::try_from(record_id_to_run_id.len()).unwrap_or(i32::MAX);
        if self
            .store
            .update_queued_run_set_state_and_counts(
                run_set.run_set_id,
                CbasRunSetStatus::Queued,
                run_count,
                0,
                Utc::now(),
            )
            .await?
            == 0
        {
            warn!(run_set_id = %run_set.run_set_id, "Zero rows updated while recording run count");
        }

        let runs = record_id_to_run_id
            .values()
            .map(|run_id| RunStateResponse::new(*run_id, CbasRunStatus::Queued))
            .collect();
        let run_set_id = run_set.run_set_id;

        let submission = SubmissionRequest {
            workflow_url: method_version.url,
            record_id_to_run_id,
            input_definitions: request.workflow_input_definitions,
            token,
            run_set,
        };
        let dispatch_failure = submission.clone();
        let panic_failure = submission.clone();
        let orchestrator = Arc::clone(&self.orchestrator);
        let job = async move {
            let finished = AssertUnwindSafe(orchestrator.submit(submission))
                .catch_unwind()
                .await;
            if finished.is_err() {
                let message = format!("Submission of RunSet {run_set_id} terminated unexpectedly.");
                error!(run_set_id = %run_set_id, "{message}");
                orchestrator.fail_submission(&panic_failure, &message).await;
            }
        };

        if let Err(e) = self.worker_pool.execute(job).await {
            let message = format!("Unable to dispatch submission for RunSet {run_set_id}. {e}");
            warn!(run_set_id = %run_set_id, "{message}");
            self.orchestrator.fail_submission(&dispatch_failure, &message).await;
            return Err(e.into());
        }

        log_run_set_operation("register", run_set_id, CbasRunSetStatus::Queued.as_str(), None);
        info!(run_set_id = %run_set_id, run_count, "Run set registered and dispatched");

        Ok(RunSetSubmissionResponse {
            run_set_id,
            runs,
            state: CbasRunSetStatus::Queued,
        })
    }

    pub async fn abort_run_set(
        &self,
        run_set_id: Uuid,
        token: &BearerToken,
    ) -> Result<AbortRequestDetails> {
        self.abort_manager.abort(run_set_id, token).await
    }

    fn validate(&self, request: &RunSetRequest) -> Result<()> {
        let record_ids = &request.records.record_ids;
        if record_ids.is_empty() {
            return Err(CbasError::ValidationError(
                "At least one record id is required".to_string(),
            ));
        }
        if record_ids.len() > self.max_record_ids {
            return Err(CbasError::ValidationError(format!(
                "{} record ids submitted exceeds the maximum of {}",
                record_ids.len(),
                self.max_record_ids
            )));
        }

        let mut seen = HashSet::with_capacity(record_ids.len());
        let duplicates: Vec<&str> = record_ids
            .iter()
            .filter(|id| !seen.insert(id.as_str()))
            .map(String::as_str)
            .collect();
        if !duplicates.is_empty() {
            return Err(CbasError::ValidationError(format!(
                "Duplicate record ids: {}",
                duplicates.join(", ")
            )));
        }
        Ok(())
    }
}
