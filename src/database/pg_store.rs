//! PostgreSQL implementation of [`RunStore`].
//!
//! Statuses are stored as their upper-case names. Guards against leaving a
//! terminal state live in the `WHERE` clauses, so concurrent writers (submission
//! and reconciliation) cannot resurrect a finished run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::store::{RunStore, StoreError, StoreResult};
use crate::models::{MethodVersion, Run, RunSet, RunsFilter, StatusCount};
use crate::state_machine::{CbasRunSetStatus, CbasRunStatus};

const RUN_SET_COLUMNS: &str = "run_set_id, method_version_id, run_set_name, run_set_description, \
     call_caching_enabled, is_template, status, submission_timestamp, last_modified_timestamp, \
     last_polled_timestamp, run_count, error_count, input_definition, output_definition, \
     record_type, user_id, original_workspace_id";

const RUN_COLUMNS: &str = "run_id, engine_id, run_set_id, record_id, submission_timestamp, status, \
     last_modified_timestamp, last_polled_timestamp, error_messages";

fn terminal_run_statuses() -> Vec<String> {
    CbasRunStatus::TERMINAL_STATES
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

fn terminal_run_set_statuses() -> Vec<String> {
    CbasRunSetStatus::ALL
        .iter()
        .filter(|s| s.is_terminal())
        .map(|s| s.as_str().to_string())
        .collect()
}

#[derive(Debug, Clone)]
pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn create_run_set(&self, run_set: &RunSet) -> StoreResult<u64> {
        let sql = format!(
            "INSERT INTO run_set ({RUN_SET_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        );
        let result = sqlx::query(&sql)
            .bind(run_set.run_set_id)
            .bind(run_set.method_version_id)
            .bind(&run_set.name)
            .bind(&run_set.description)
            .bind(run_set.call_caching_enabled)
            .bind(run_set.is_template)
            .bind(run_set.status.as_str())
            .bind(run_set.submission_timestamp)
            .bind(run_set.last_modified_timestamp)
            .bind(run_set.last_polled_timestamp)
            .bind(run_set.run_count)
            .bind(run_set.error_count)
            .bind(&run_set.input_definition)
            .bind(&run_set.output_definition)
            .bind(&run_set.record_type)
            .bind(&run_set.user_id)
            .bind(run_set.original_workspace_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_run_set(&self, run_set_id: Uuid) -> StoreResult<Option<RunSet>> {
        let sql = format!("SELECT {RUN_SET_COLUMNS} FROM run_set WHERE run_set_id = $1");
        let run_set = sqlx::query_as::<_, RunSet>(&sql)
            .bind(run_set_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(run_set)
    }

    async fn list_run_sets_to_reconcile(&self) -> StoreResult<Vec<RunSet>> {
        let sql = format!(
            "SELECT {RUN_SET_COLUMNS} FROM run_set rs \
             WHERE rs.is_template = FALSE \
               AND (rs.status <> ALL($1) \
                    OR EXISTS (SELECT 1 FROM run r \
                               WHERE r.run_set_id = rs.run_set_id AND r.status <> ALL($2))) \
             ORDER BY rs.last_polled_timestamp ASC"
        );
        let run_sets = sqlx::query_as::<_, RunSet>(&sql)
            .bind(terminal_run_set_statuses())
            .bind(terminal_run_statuses())
            .fetch_all(&self.pool)
            .await?;
        Ok(run_sets)
    }

    async fn run_set_ids_with_outstanding_runs(
        &self,
        run_set_ids: &[Uuid],
    ) -> StoreResult<HashSet<Uuid>> {
        if run_set_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query(
            "SELECT DISTINCT run_set_id FROM run WHERE run_set_id = ANY($1) AND status <> ALL($2)",
        )
        .bind(run_set_ids.to_vec())
        .bind(terminal_run_statuses())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("run_set_id").map_err(StoreError::from))
            .collect()
    }

    async fn update_run_set_state_and_counts(
        &self,
        run_set_id: Uuid,
        status: CbasRunSetStatus,
        run_count: i32,
        error_count: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE run_set SET status = $2, run_count = $3, error_count = $4, \
             last_modified_timestamp = $5, last_polled_timestamp = $5 \
             WHERE run_set_id = $1",
        )
        .bind(run_set_id)
        .bind(status.as_str())
        .bind(run_count)
        .bind(error_count)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_queued_run_set_state_and_counts(
        &self,
        run_set_id: Uuid,
        status: CbasRunSetStatus,
        run_count: i32,
        error_count: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE run_set SET status = $2, run_count = $3, error_count = $4, \
             last_modified_timestamp = $5, last_polled_timestamp = $5 \
             WHERE run_set_id = $1 AND status = $6",
        )
        .bind(run_set_id)
        .bind(status.as_str())
        .bind(run_count)
        .bind(error_count)
        .bind(now)
        .bind(CbasRunSetStatus::Queued.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_run_set_status(
        &self,
        run_set_id: Uuid,
        status: CbasRunSetStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE run_set SET status = $2, last_modified_timestamp = $3 \
             WHERE run_set_id = $1 AND status <> ALL($4)",
        )
        .bind(run_set_id)
        .bind(status.as_str())
        .bind(now)
        .bind(terminal_run_set_statuses())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_run_sets_last_polled(
        &self,
        run_set_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        if run_set_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE run_set SET last_polled_timestamp = $2 WHERE run_set_id = ANY($1)",
        )
        .bind(run_set_ids.to_vec())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn create_run(&self, run: &Run) -> StoreResult<u64> {
        let sql = format!(
            "INSERT INTO run ({RUN_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        );
        let result = sqlx::query(&sql)
            .bind(run.run_id)
            .bind(run.engine_id)
            .bind(run.run_set_id)
            .bind(&run.record_id)
            .bind(run.submission_timestamp)
            .bind(run.status.as_str())
            .bind(run.last_modified_timestamp)
            .bind(run.last_polled_timestamp)
            .bind(&run.error_messages)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_runs(&self, filter: &RunsFilter) -> StoreResult<Vec<Run>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {RUN_COLUMNS} FROM run WHERE TRUE"));

        if let Some(run_id) = filter.run_id {
            query.push(" AND run_id = ").push_bind(run_id);
        }
        if let Some(run_set_id) = filter.run_set_id {
            query.push(" AND run_set_id = ").push_bind(run_set_id);
        }
        if let Some(statuses) = filter.statuses.as_ref().filter(|s| !s.is_empty()) {
            let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
            query.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        query.push(" ORDER BY submission_timestamp ASC, run_id ASC");

        let runs = query.build_query_as::<Run>().fetch_all(&self.pool).await?;
        Ok(runs)
    }

    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: CbasRunStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE run SET status = $2, last_modified_timestamp = $3, last_polled_timestamp = $3 \
             WHERE run_id = $1 AND status <> ALL($4)",
        )
        .bind(run_id)
        .bind(status.as_str())
        .bind(now)
        .bind(terminal_run_statuses())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_run_status_with_error(
        &self,
        run_id: Uuid,
        status: CbasRunStatus,
        now: DateTime<Utc>,
        error_message: &str,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE run SET status = $2, last_modified_timestamp = $3, last_polled_timestamp = $3, \
             error_messages = $4 \
             WHERE run_id = $1 AND status <> ALL($5)",
        )
        .bind(run_id)
        .bind(status.as_str())
        .bind(now)
        .bind(error_message)
        .bind(terminal_run_statuses())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_engine_id_and_status(
        &self,
        run_id: Uuid,
        engine_id: Uuid,
        status: CbasRunStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE run SET engine_id = $2, status = $3, last_modified_timestamp = $4, \
             error_messages = NULL \
             WHERE run_id = $1 AND engine_id IS NULL AND status <> ALL($5)",
        )
        .bind(run_id)
        .bind(engine_id)
        .bind(status.as_str())
        .bind(now)
        .bind(terminal_run_statuses())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_error_message(&self, run_id: Uuid, error_message: &str) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE run SET error_messages = $2 WHERE run_id = $1")
            .bind(run_id)
            .bind(error_message)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn update_runs_last_polled(
        &self,
        run_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        if run_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("UPDATE run SET last_polled_timestamp = $2 WHERE run_id = ANY($1)")
            .bind(run_ids.to_vec())
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_runs_by_status(
        &self,
        run_set_id: Uuid,
    ) -> StoreResult<HashMap<CbasRunStatus, StatusCount>> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS count, MAX(last_modified_timestamp) AS last_modified \
             FROM run WHERE run_set_id = $1 GROUP BY status",
        )
        .bind(run_set_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let raw_status: String = row.try_get("status")?;
            let status = raw_status
                .parse::<CbasRunStatus>()
                .map_err(StoreError::Decode)?;
            counts.insert(
                status,
                StatusCount {
                    count: row.try_get("count")?,
                    last_modified: row.try_get("last_modified")?,
                },
            );
        }
        Ok(counts)
    }

    async fn get_method_version(
        &self,
        method_version_id: Uuid,
    ) -> StoreResult<Option<MethodVersion>> {
        let method_version = sqlx::query_as::<_, MethodVersion>(
            "SELECT method_version_id, method_id, method_version_name AS name, \
             method_version_description AS description, method_version_created AS created, \
             method_version_url AS url, branch_or_tag_name, \
             method_version_last_run_set_id AS last_run_set_id \
             FROM method_version WHERE method_version_id = $1",
        )
        .bind(method_version_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(method_version)
    }
}
