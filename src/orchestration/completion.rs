//! # Run Completion Handler
//!
//! Applies a status observed in the engine to a local run. Completed runs have
//! their outputs written back to the record before the status is persisted, so a
//! run is only COMPLETE once its outputs have landed. Failed runs carry the
//! engine's failure reason.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::outputs::build_outputs;
use crate::clients::{ExecutionEngine, RecordSink};
use crate::database::RunStore;
use crate::logging::{log_error, log_run_operation};
use crate::models::{Run, RunSet};
use crate::state_machine::CbasRunStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// The new status (and error message, if any) was persisted
    Updated {
        status: CbasRunStatus,
        error_message: Option<String>,
    },
    /// Nothing to write, or the store refused the write
    Unchanged,
    /// A transient failure; the run should be retried on the next cycle
    Deferred,
}

pub struct RunCompletionHandler {
    store: Arc<dyn RunStore>,
    engine: Arc<dyn ExecutionEngine>,
    sink: Arc<dyn RecordSink>,
}

impl RunCompletionHandler {
    pub fn new(
        store: Arc<dyn RunStore>,
        engine: Arc<dyn ExecutionEngine>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self { store, engine, sink }
    }

    pub async fn update_run_completion(
        &self,
        run: &Run,
        run_set: &RunSet,
        status: CbasRunStatus,
    ) -> CompletionOutcome {
        if !run.status.can_transition_to(status) {
            debug!(run_id = %run.run_id, from = %run.status, to = %status, "Skipping transition");
            return CompletionOutcome::Unchanged;
        }

        match status {
            CbasRunStatus::Complete => self.complete(run, run_set).await,
            CbasRunStatus::ExecutorError | CbasRunStatus::SystemError => {
                self.fail(run, status).await
            }
            _ => self.persist(run, status, None).await,
        }
    }

    async fn complete(&self, run: &Run, run_set: &RunSet) -> CompletionOutcome {
        let Some(engine_id) = run.engine_id else {
            warn!(run_id = %run.run_id, "Completed run has no engine id");
            return CompletionOutcome::Deferred;
        };

        let engine_outputs = match self.engine.outputs(engine_id).await {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!(run_id = %run.run_id, error = %e, "Could not fetch workflow outputs");
                return CompletionOutcome::Deferred;
            }
        };

        let built = run_set
            .output_definitions()
            .map_err(|e| e.to_string())
            .and_then(|definitions| {
                build_outputs(&definitions, &engine_outputs).map_err(|e| e.to_string())
            });

        let built = match built {
            Ok(built) => built,
            Err(e) => {
                let message = format!(
                    "Error while updating data table attributes for record {}: {e}",
                    run.record_id
                );
                return self
                    .persist(run, CbasRunStatus::SystemError, Some(message))
                    .await;
            }
        };

        if !built.attributes.is_empty() {
            if let Err(e) = self
                .sink
                .update_record(&run_set.record_type, &run.record_id, built.attributes)
                .await
            {
                log_error(
                    "completion",
                    "update_record",
                    &e.to_string(),
                    Some(&run.record_id),
                );
                return CompletionOutcome::Deferred;
            }
            info!(
                run_id = %run.run_id,
                record_id = %run.record_id,
                file_count = built.file_count,
                "Workflow outputs written to record"
            );
        }

        self.persist(run, CbasRunStatus::Complete, None).await
    }

    async fn fail(&self, run: &Run, status: CbasRunStatus) -> CompletionOutcome {
        let message = match run.engine_id {
            Some(engine_id) => match self.engine.failure_message(engine_id).await {
                Ok(message) => Some(message).filter(|m| !m.is_empty()),
                Err(e) => {
                    warn!(run_id = %run.run_id, error = %e, "Could not fetch failure details");
                    None
                }
            },
            None => None,
        };
        self.persist(run, status, message).await
    }

    async fn persist(
        &self,
        run: &Run,
        status: CbasRunStatus,
        error_message: Option<String>,
    ) -> CompletionOutcome {
        let now = Utc::now();
        let result = match &error_message {
            Some(message) => {
                self.store
                    .update_run_status_with_error(run.run_id, status, now, message)
                    .await
            }
            None => self.store.update_run_status(run.run_id, status, now).await,
        };

        match result {
            Ok(0) => {
                warn!(run_id = %run.run_id, status = %status, "Zero rows updated for run status");
                CompletionOutcome::Unchanged
            }
            Ok(_) => {
                log_run_operation(
                    "status_update",
                    run.run_id,
                    Some(run.run_set_id),
                    status.as_str(),
                    error_message.as_deref(),
                );
                CompletionOutcome::Updated {
                    status,
                    error_message,
                }
            }
            Err(e) => {
                log_error("completion", "persist", &e.to_string(), Some(&run.run_id.to_string()));
                CompletionOutcome::Deferred
            }
        }
    }
}
