//! # Run Set Abort
//!
//! Requests cancellation of every unfinished run in a run set. The run set is
//! moved to CANCELING before the engine is contacted; the final CANCELED state
//! is reached through reconciliation once the engine confirms.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::types::AbortRequestDetails;
use crate::clients::{BearerToken, ExecutionEngine};
use crate::database::RunStore;
use crate::error::{CbasError, Result};
use crate::logging::{log_error, log_run_operation, log_run_set_operation};
use crate::models::{Run, RunsFilter};
use crate::state_machine::{CbasRunSetStatus, CbasRunStatus};

pub struct RunSetAbortManager {
    store: Arc<dyn RunStore>,
    engine: Arc<dyn ExecutionEngine>,
}

impl RunSetAbortManager {
    pub fn new(store: Arc<dyn RunStore>, engine: Arc<dyn ExecutionEngine>) -> Self {
        Self { store, engine }
    }

    #[instrument(skip(self, token))]
    pub async fn abort(
        &self,
        run_set_id: Uuid,
        token: &BearerToken,
    ) -> Result<AbortRequestDetails> {
        let run_set = self
            .store
            .get_run_set(run_set_id)
            .await?
            .ok_or_else(|| CbasError::NotFound(format!("Run set {run_set_id} not found")))?;

        if run_set.status.non_terminal() && run_set.status != CbasRunSetStatus::Canceling {
            match self
                .store
                .update_run_set_status(run_set_id, CbasRunSetStatus::Canceling, Utc::now())
                .await
            {
                Ok(0) => warn!(
                    run_set_id = %run_set_id,
                    "Zero rows updated while marking run set CANCELING"
                ),
                Ok(_) => log_run_set_operation(
                    "abort",
                    run_set_id,
                    CbasRunSetStatus::Canceling.as_str(),
                    None,
                ),
                Err(e) => log_error(
                    "abort",
                    "update_run_set_status",
                    &e.to_string(),
                    Some(&run_set_id.to_string()),
                ),
            }
        }

        let runs = self.store.get_runs(&RunsFilter::non_terminal(run_set_id)).await?;

        let mut details = AbortRequestDetails::default();
        for run in runs {
            if self.abort_run(&run, token).await {
                details.submitted.push(run.run_id);
            } else {
                details.failed.push(run.run_id);
            }
        }

        info!(
            run_set_id = %run_set_id,
            submitted = details.submitted.len(),
            failed = details.failed.len(),
            "Abort requested"
        );
        Ok(details)
    }

    async fn abort_run(&self, run: &Run, token: &BearerToken) -> bool {
        let cancel_result = match run.engine_id {
            Some(engine_id) => self
                .engine
                .cancel(engine_id, token)
                .await
                .map_err(|e| e.to_string()),
            None => Err("Run has no engine id".to_string()),
        };

        match cancel_result {
            Ok(()) => {
                if run.status.can_transition_to(CbasRunStatus::Canceling) {
                    if let Err(e) = self
                        .store
                        .update_run_status(run.run_id, CbasRunStatus::Canceling, Utc::now())
                        .await
                    {
                        log_error(
                            "abort",
                            "update_run_status",
                            &e.to_string(),
                            Some(&run.run_id.to_string()),
                        );
                    }
                }
                log_run_operation(
                    "abort",
                    run.run_id,
                    Some(run.run_set_id),
                    CbasRunStatus::Canceling.as_str(),
                    None,
                );
                true
            }
            Err(reason) => {
                let message = format!("Unable to abort workflow {}.", run.run_id);
                warn!(run_id = %run.run_id, error = %reason, "{message}");
                if let Err(e) = self.store.update_error_message(run.run_id, &message).await {
                    log_error(
                        "abort",
                        "update_error_message",
                        &e.to_string(),
                        Some(&run.run_id.to_string()),
                    );
                }
                false
            }
        }
    }
}
