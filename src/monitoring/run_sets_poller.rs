//! # Smart Run Sets Poller
//!
//! One reconciliation sweep over every run set that may still change. For each
//! run set the unfinished runs are polled, the run status counts are re-read,
//! and the run set's status and counts are rewritten only when they moved.
//!
//! Terminal run sets are visited only while they still own unfinished runs, so
//! a set whose status was written ahead of its runs still converges. QUEUED run
//! sets belong to an in-flight submission and are left alone.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::runs_poller::SmartRunsPoller;
use super::seconds;
use super::time_limited_updater;
use crate::config::PollingConfig;
use crate::database::RunStore;
use crate::error::Result;
use crate::logging::{log_error, log_run_set_operation};
use crate::models::{RunSet, RunsFilter};
use crate::state_machine::{CbasRunSetStatus, CbasRunStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct RunSetsPollResult {
    pub run_sets: Vec<RunSet>,
    pub total_eligible: usize,
    pub total_updated: usize,
    pub fully_updated: bool,
}

pub struct SmartRunSetsPoller {
    store: Arc<dyn RunStore>,
    runs_poller: SmartRunsPoller,
    max_run_set_update: chrono::Duration,
}

impl SmartRunSetsPoller {
    pub fn new(
        store: Arc<dyn RunStore>,
        runs_poller: SmartRunsPoller,
        config: &PollingConfig,
    ) -> Self {
        Self {
            store,
            runs_poller,
            max_run_set_update: seconds(config.max_smart_poll_run_set_update_seconds),
        }
    }

    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Result<RunSetsPollResult> {
        let run_sets = self.store.list_run_sets_to_reconcile().await?;
        let terminal_ids: Vec<Uuid> = run_sets
            .iter()
            .filter(|run_set| run_set.status.is_terminal())
            .map(|run_set| run_set.run_set_id)
            .collect();
        let outstanding = if terminal_ids.is_empty() {
            HashSet::new()
        } else {
            self.store.run_set_ids_with_outstanding_runs(&terminal_ids).await?
        };

        let end_time = Utc::now() + self.max_run_set_update;
        let result = time_limited_updater::update(
            run_sets,
            |run_set| run_set.run_set_id,
            |run_set| {
                run_set.status != CbasRunSetStatus::Queued
                    && !run_set.is_template
                    && (run_set.status.non_terminal() || outstanding.contains(&run_set.run_set_id))
            },
            |a, b| a.last_polled_timestamp.cmp(&b.last_polled_timestamp),
            |run_set| self.reconcile_run_set(run_set, end_time),
            end_time,
        )
        .await?;

        info!(
            total_eligible = result.total_eligible,
            total_updated = result.total_updated,
            fully_updated = result.fully_updated,
            "Run set reconciliation sweep finished"
        );

        Ok(RunSetsPollResult {
            run_sets: result.updated_list,
            total_eligible: result.total_eligible,
            total_updated: result.total_updated,
            fully_updated: result.fully_updated,
        })
    }

    async fn reconcile_run_set(&self, mut run_set: RunSet, end_time: DateTime<Utc>) -> RunSet {
        let run_set_id = run_set.run_set_id;

        match self.store.get_runs(&RunsFilter::non_terminal(run_set_id)).await {
            Ok(runs) if !runs.is_empty() => {
                if let Err(e) = self.runs_poller.update_runs(runs, &run_set, Some(end_time)).await {
                    warn!(run_set_id = %run_set_id, error = %e, "Run poll pass rejected");
                }
            }
            Ok(_) => {}
            Err(e) => {
                log_error(
                    "run_sets_poller",
                    "get_runs",
                    &e.to_string(),
                    Some(&run_set_id.to_string()),
                );
                return run_set;
            }
        }

        let counts = match self.store.count_runs_by_status(run_set_id).await {
            Ok(counts) => counts,
            Err(e) => {
                log_error(
                    "run_sets_poller",
                    "count_runs_by_status",
                    &e.to_string(),
                    Some(&run_set_id.to_string()),
                );
                return run_set;
            }
        };

        let by_status: HashMap<CbasRunStatus, i64> =
            counts.iter().map(|(status, count)| (*status, count.count)).collect();
        let aggregated = CbasRunSetStatus::from_run_statuses(&by_status);
        // An abort holds until the unfinished runs settle
        let status = if run_set.status == CbasRunSetStatus::Canceling
            && aggregated == CbasRunSetStatus::Running
        {
            CbasRunSetStatus::Canceling
        } else {
            aggregated
        };
        let run_count = to_count(by_status.values().sum());
        let error_count = to_count(
            by_status
                .iter()
                .filter(|(status, _)| status.in_error_state())
                .map(|(_, count)| *count)
                .sum(),
        );

        let now = Utc::now();
        if status != run_set.status
            || run_count != run_set.run_count
            || error_count != run_set.error_count
        {
            match self
                .store
                .update_run_set_state_and_counts(run_set_id, status, run_count, error_count, now)
                .await
            {
                Ok(0) => warn!(run_set_id = %run_set_id, "Zero rows updated for run set"),
                Ok(_) => {
                    log_run_set_operation("reconcile", run_set_id, status.as_str(), None);
                    run_set.status = status;
                    run_set.run_count = run_count;
                    run_set.error_count = error_count;
                    run_set.last_modified_timestamp = now;
                    run_set.last_polled_timestamp = now;
                }
                Err(e) => log_error(
                    "run_sets_poller",
                    "update_run_set_state_and_counts",
                    &e.to_string(),
                    Some(&run_set_id.to_string()),
                ),
            }
        } else {
            debug!(run_set_id = %run_set_id, status = %status, "Run set unchanged");
            match self.store.update_run_sets_last_polled(&[run_set_id], now).await {
                Ok(_) => run_set.last_polled_timestamp = now,
                Err(e) => log_error(
                    "run_sets_poller",
                    "update_run_sets_last_polled",
                    &e.to_string(),
                    Some(&run_set_id.to_string()),
                ),
            }
        }

        run_set
    }
}

fn to_count(n: i64) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
