//! In-memory [`RunStore`] with the same write guards as the PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::database::{RunStore, StoreError, StoreResult};
use crate::models::{MethodVersion, Run, RunSet, RunsFilter, StatusCount};
use crate::state_machine::{CbasRunSetStatus, CbasRunStatus};

#[derive(Debug, Default)]
struct StoreState {
    run_sets: IndexMap<Uuid, RunSet>,
    runs: IndexMap<Uuid, Run>,
    method_versions: HashMap<Uuid, MethodVersion>,
    run_status_writes: usize,
    run_set_status_writes: usize,
    fail_writes: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    state: Mutex<StoreState>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_method_version(&self, method_version: MethodVersion) {
        self.state
            .lock()
            .method_versions
            .insert(method_version.method_version_id, method_version);
    }

    pub fn insert_run_set(&self, run_set: RunSet) {
        self.state.lock().run_sets.insert(run_set.run_set_id, run_set);
    }

    pub fn insert_run(&self, run: Run) {
        self.state.lock().runs.insert(run.run_id, run);
    }

    pub fn run(&self, run_id: Uuid) -> Option<Run> {
        self.state.lock().runs.get(&run_id).cloned()
    }

    pub fn run_set(&self, run_set_id: Uuid) -> Option<RunSet> {
        self.state.lock().run_sets.get(&run_set_id).cloned()
    }

    pub fn run_sets(&self) -> Vec<RunSet> {
        self.state.lock().run_sets.values().cloned().collect()
    }

    pub fn runs_for(&self, run_set_id: Uuid) -> Vec<Run> {
        self.state
            .lock()
            .runs
            .values()
            .filter(|run| run.run_set_id == run_set_id)
            .cloned()
            .collect()
    }

    /// Number of successful run status writes
    pub fn run_status_writes(&self) -> usize {
        self.state.lock().run_status_writes
    }

    /// Number of successful run set status writes
    pub fn run_set_status_writes(&self) -> usize {
        self.state.lock().run_set_status_writes
    }

    /// Make every subsequent write fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    fn check_writable(state: &StoreState) -> StoreResult<()> {
        if state.fail_writes {
            Err(StoreError::Database("writes disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create_run_set(&self, run_set: &RunSet) -> StoreResult<u64> {
        let mut state = self.state.lock();
        Self::check_writable(&state)?;
        if state.run_sets.contains_key(&run_set.run_set_id) {
            return Err(StoreError::Duplicate(run_set.run_set_id.to_string()));
        }
        state.run_sets.insert(run_set.run_set_id, run_set.clone());
        Ok(1)
    }

    async fn get_run_set(&self, run_set_id: Uuid) -> StoreResult<Option<RunSet>> {
        Ok(self.state.lock().run_sets.get(&run_set_id).cloned())
    }

    async fn list_run_sets_to_reconcile(&self) -> StoreResult<Vec<RunSet>> {
        let state = self.state.lock();
        let mut run_sets: Vec<RunSet> = state
            .run_sets
            .values()
            .filter(|run_set| !run_set.is_template)
            .filter(|run_set| {
                run_set.status.non_terminal()
                    || state
                        .runs
                        .values()
                        .any(|run| run.run_set_id == run_set.run_set_id && run.non_terminal())
            })
            .cloned()
            .collect();
        run_sets.sort_by_key(|run_set| run_set.last_polled_timestamp);
        Ok(run_sets)
    }

    async fn run_set_ids_with_outstanding_runs(
        &self,
        run_set_ids: &[Uuid],
    ) -> StoreResult<HashSet<Uuid>> {
        let state = self.state.lock();
        Ok(state
            .runs
            .values()
            .filter(|run| run.non_terminal() && run_set_ids.contains(&run.run_set_id))
            .map(|run| run.run_set_id)
            .collect())
    }

    async fn update_run_set_state_and_counts(
        &self,
        run_set_id: Uuid,
        status: CbasRunSetStatus,
        run_count: i32,
        error_count: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut state = self.state.lock();
        Self::check_writable(&state)?;
        let Some(run_set) = state.run_sets.get_mut(&run_set_id) else {
            return Ok(0);
        };
        run_set.status = status;
        run_set.run_count = run_count;
        run_set.error_count = error_count;
        run_set.last_modified_timestamp = now;
        run_set.last_polled_timestamp = now;
        state.run_set_status_writes += 1;
        Ok(1)
    }

    async fn update_queued_run_set_state_and_counts(
        &self,
        run_set_id: Uuid,
        status: CbasRunSetStatus,
        run_count: i32,
        error_count: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut state = self.state.lock();
        Self::check_writable(&state)?;
        match state.run_sets.get_mut(&run_set_id) {
            Some(run_set) if run_set.status == CbasRunSetStatus::Queued => {
                run_set.status = status;
                run_set.run_count = run_count;
                run_set.error_count = error_count;
                run_set.last_modified_timestamp = now;
                run_set.last_polled_timestamp = now;
                state.run_set_status_writes += 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn update_run_set_status(
        &self,
        run_set_id: Uuid,
        status: CbasRunSetStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut state = self.state.lock();
        Self::check_writable(&state)?;
        match state.run_sets.get_mut(&run_set_id) {
            Some(run_set) if run_set.status.non_terminal() => {
                run_set.status = status;
                run_set.last_modified_timestamp = now;
                state.run_set_status_writes += 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn update_run_sets_last_polled(
        &self,
        run_set_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut state = self.state.lock();
        Self::check_writable(&state)?;
        let mut updated = 0;
        for run_set_id in run_set_ids {
            if let Some(run_set) = state.run_sets.get_mut(run_set_id) {
                run_set.last_polled_timestamp = now;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn create_run(&self, run: &Run) -> StoreResult<u64> {
        let mut state = self.state.lock();
        Self::check_writable(&state)?;
        if state.runs.contains_key(&run.run_id) {
            return Err(StoreError::Duplicate(run.run_id.to_string()));
        }
        state.runs.insert(run.run_id, run.clone());
        Ok(1)
    }

    async fn get_runs(&self, filter: &RunsFilter) -> StoreResult<Vec<Run>> {
        Ok(self
            .state
            .lock()
            .runs
            .values()
            .filter(|run| filter.matches(run))
            .cloned()
            .collect())
    }

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: CbasRunStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut state = self.state.lock();
        Self::check_writable(&state)?;
        match state.runs.get_mut(&run_id) {
            Some(run) if run.non_terminal() => {
                run.status = status;
                run.last_modified_timestamp = now;
                run.last_polled_timestamp = now;
                state.run_status_writes += 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn update_run_status_with_error(
        &self,
        run_id: Uuid,
        status: CbasRunStatus,
        now: DateTime<Utc>,
        error_message: &str,
    ) -> StoreResult<u64> {
        let mut state = self.state.lock();
        Self::check_writable(&state)?;
        match state.runs.get_mut(&run_id) {
            Some(run) if run.non_terminal() => {
                run.status = status;
                run.error_messages = Some(error_message.to_string());
                run.last_modified_timestamp = now;
                run.last_polled_timestamp = now;
                state.run_status_writes += 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn update_engine_id_and_status(
        &self,
        run_id: Uuid,
        engine_id: Uuid,
        status: CbasRunStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut state = self.state.lock();
        Self::check_writable(&state)?;
        match state.runs.get_mut(&run_id) {
            Some(run) if run.engine_id.is_none() && run.non_terminal() => {
                run.engine_id = Some(engine_id);
                run.status = status;
                run.error_messages = None;
                run.last_modified_timestamp = now;
                state.run_status_writes += 1;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn update_error_message(&self, run_id: Uuid, error_message: &str) -> StoreResult<u64> {
        let mut state = self.state.lock();
        Self::check_writable(&state)?;
        match state.runs.get_mut(&run_id) {
            Some(run) => {
                run.error_messages = Some(error_message.to_string());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn update_runs_last_polled(
        &self,
        run_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut state = self.state.lock();
        Self::check_writable(&state)?;
        let mut updated = 0;
        for run_id in run_ids {
            if let Some(run) = state.runs.get_mut(run_id) {
                run.last_polled_timestamp = now;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn count_runs_by_status(
        &self,
        run_set_id: Uuid,
    ) -> StoreResult<HashMap<CbasRunStatus, StatusCount>> {
        let state = self.state.lock();
        let mut counts: HashMap<CbasRunStatus, StatusCount> = HashMap::new();
        for run in state.runs.values().filter(|run| run.run_set_id == run_set_id) {
            let entry = counts.entry(run.status).or_insert(StatusCount {
                count: 0,
                last_modified: None,
            });
            entry.count += 1;
            entry.last_modified = entry
                .last_modified
                .max(Some(run.last_modified_timestamp));
        }
        Ok(counts)
    }

    async fn get_method_version(
        &self,
        method_version_id: Uuid,
    ) -> StoreResult<Option<MethodVersion>> {
        Ok(self.state.lock().method_versions.get(&method_version_id).cloned())
    }
}
