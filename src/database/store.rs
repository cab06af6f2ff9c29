//! # Run Store
//!
//! Persistence seam for run sets and runs. Every write is a single-row (or
//! single-statement) best-effort update that reports how many rows it touched;
//! a zero count is an anomaly for the caller to log, never an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{MethodVersion, Run, RunSet, RunsFilter, StatusCount};
use crate::state_machine::{CbasRunSetStatus, CbasRunStatus};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Failed to decode stored row: {0}")]
    Decode(String),
    #[error("Duplicate key: {0}")]
    Duplicate(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Decode(err.to_string())
            }
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::Duplicate(db_err.message().to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RunStore: Send + Sync {
    // Run sets

    async fn create_run_set(&self, run_set: &RunSet) -> StoreResult<u64>;

    async fn get_run_set(&self, run_set_id: Uuid) -> StoreResult<Option<RunSet>>;

    /// Run sets the reconciler must visit: non-terminal ones, plus terminal ones
    /// that still own non-terminal runs.
    async fn list_run_sets_to_reconcile(&self) -> StoreResult<Vec<RunSet>>;

    /// Subset of `run_set_ids` that still own at least one non-terminal run.
    async fn run_set_ids_with_outstanding_runs(
        &self,
        run_set_ids: &[Uuid],
    ) -> StoreResult<HashSet<Uuid>>;

    async fn update_run_set_state_and_counts(
        &self,
        run_set_id: Uuid,
        status: CbasRunSetStatus,
        run_count: i32,
        error_count: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Same write as [`RunStore::update_run_set_state_and_counts`], applied only
    /// while the run set is still QUEUED. Submission finishes through this so it
    /// cannot overwrite an abort that landed while it was running.
    async fn update_queued_run_set_state_and_counts(
        &self,
        run_set_id: Uuid,
        status: CbasRunSetStatus,
        run_count: i32,
        error_count: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Set the status only while the run set is non-terminal.
    async fn update_run_set_status(
        &self,
        run_set_id: Uuid,
        status: CbasRunSetStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn update_run_sets_last_polled(
        &self,
        run_set_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    // Runs

    async fn create_run(&self, run: &Run) -> StoreResult<u64>;

    async fn get_runs(&self, filter: &RunsFilter) -> StoreResult<Vec<Run>>;

    /// Set the status unless the run is already terminal.
    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: CbasRunStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Set status and error message unless the run is already terminal.
    async fn update_run_status_with_error(
        &self,
        run_id: Uuid,
        status: CbasRunStatus,
        now: DateTime<Utc>,
        error_message: &str,
    ) -> StoreResult<u64>;

    /// Record the engine id with the new status and clear any earlier error
    /// message. The engine id is written at most once: runs that already have one
    /// are not touched.
    async fn update_engine_id_and_status(
        &self,
        run_id: Uuid,
        engine_id: Uuid,
        status: CbasRunStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn update_error_message(&self, run_id: Uuid, error_message: &str) -> StoreResult<u64>;

    async fn update_runs_last_polled(
        &self,
        run_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn count_runs_by_status(
        &self,
        run_set_id: Uuid,
    ) -> StoreResult<HashMap<CbasRunStatus, StatusCount>>;

    // Methods

    async fn get_method_version(
        &self,
        method_version_id: Uuid,
    ) -> StoreResult<Option<MethodVersion>>;
}
