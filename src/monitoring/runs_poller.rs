//! # Smart Runs Poller
//!
//! Brings a run set's unfinished runs in line with the engine. Runs are polled
//! oldest-first, only when they have an engine id and have not been polled in
//! the last `min_seconds_between_run_status_polls`, and only until the pass
//! deadline. Runs that were not reached are picked up by the next pass.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use super::seconds;
use super::time_limited_updater::{self, TimeLimitedUpdateError, UpdateResult};
use crate::clients::ExecutionEngine;
use crate::config::PollingConfig;
use crate::database::RunStore;
use crate::logging::log_error;
use crate::models::{Run, RunSet};
use crate::orchestration::{CompletionOutcome, RunCompletionHandler};

pub struct SmartRunsPoller {
    store: Arc<dyn RunStore>,
    engine: Arc<dyn ExecutionEngine>,
    completion: Arc<RunCompletionHandler>,
    min_seconds_between_polls: Duration,
    max_run_update: Duration,
}

impl SmartRunsPoller {
    pub fn new(
        store: Arc<dyn RunStore>,
        engine: Arc<dyn ExecutionEngine>,
        completion: Arc<RunCompletionHandler>,
        config: &PollingConfig,
    ) -> Self {
        Self {
            store,
            engine,
            completion,
            min_seconds_between_polls: seconds(config.min_seconds_between_run_status_polls),
            max_run_update: seconds(config.max_smart_poll_run_update_seconds),
        }
    }

    /// Poll `runs` (all belonging to `run_set`) until the earlier of this pass's
    /// own limit and `outer_deadline`.
    pub async fn update_runs(
        &self,
        runs: Vec<Run>,
        run_set: &RunSet,
        outer_deadline: Option<DateTime<Utc>>,
    ) -> Result<UpdateResult<Run>, TimeLimitedUpdateError> {
        let now = Utc::now();
        let own_deadline = now + self.max_run_update;
        let end_time = outer_deadline.map_or(own_deadline, |outer| outer.min(own_deadline));

        let result = time_limited_updater::update(
            runs,
            |run| run.run_id,
            |run| self.should_poll(run, now),
            |a, b| a.last_polled_timestamp.cmp(&b.last_polled_timestamp),
            |run| self.poll_run(run, run_set),
            end_time,
        )
        .await?;

        debug!(
            run_set_id = %run_set.run_set_id,
            total_eligible = result.total_eligible,
            total_updated = result.total_updated,
            fully_updated = result.fully_updated,
            "Run poll pass finished"
        );
        Ok(result)
    }

    fn should_poll(&self, run: &Run, now: DateTime<Utc>) -> bool {
        run.non_terminal()
            && run.engine_id.is_some()
            && now - run.last_polled_timestamp >= self.min_seconds_between_polls
    }

    async fn poll_run(&self, mut run: Run, run_set: &RunSet) -> Run {
        let Some(engine_id) = run.engine_id else {
            return run;
        };

        let summary = match self.engine.run_summary(engine_id).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(
                    run_id = %run.run_id,
                    engine_id = %engine_id,
                    error = %e,
                    "Engine status query failed"
                );
                return run;
            }
        };

        let observed = summary
            .and_then(|summary| summary.status)
            .and_then(|status| status.to_run_status());

        match observed {
            Some(status) if run.status.can_transition_to(status) => {
                match self.completion.update_run_completion(&run, run_set, status).await {
                    CompletionOutcome::Updated {
                        status,
                        error_message,
                    } => {
                        let now = Utc::now();
                        run.status = status;
                        if error_message.is_some() {
                            run.error_messages = error_message;
                        }
                        run.last_modified_timestamp = now;
                        run.last_polled_timestamp = now;
                        run
                    }
                    CompletionOutcome::Unchanged | CompletionOutcome::Deferred => run,
                }
            }
            _ => self.mark_polled(run).await,
        }
    }

    async fn mark_polled(&self, mut run: Run) -> Run {
        let now = Utc::now();
        match self.store.update_runs_last_polled(&[run.run_id], now).await {
            Ok(_) => run.last_polled_timestamp = now,
            Err(e) => log_error(
                "runs_poller",
                "update_runs_last_polled",
                &e.to_string(),
                Some(&run.run_id.to_string()),
            ),
        }
        run
    }
}
