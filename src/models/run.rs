//! # Run Model
//!
//! One per-record workflow invocation within a run set.
//!
//! ## Database Schema
//!
//! Maps to the `run` table:
//! ```sql
//! CREATE TABLE run (
//!   run_id UUID PRIMARY KEY,
//!   engine_id UUID,
//!   run_set_id UUID NOT NULL REFERENCES run_set (run_set_id),
//!   record_id VARCHAR NOT NULL,
//!   submission_timestamp TIMESTAMPTZ NOT NULL,
//!   status VARCHAR NOT NULL,
//!   last_modified_timestamp TIMESTAMPTZ NOT NULL,
//!   last_polled_timestamp TIMESTAMPTZ NOT NULL,
//!   error_messages TEXT
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

use crate::state_machine::CbasRunStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: Uuid,
    /// Assigned when the engine accepts the workflow; set exactly once
    pub engine_id: Option<Uuid>,
    pub run_set_id: Uuid,
    pub record_id: String,
    pub submission_timestamp: DateTime<Utc>,
    pub status: CbasRunStatus,
    pub last_modified_timestamp: DateTime<Utc>,
    pub last_polled_timestamp: DateTime<Utc>,
    pub error_messages: Option<String>,
}

impl Run {
    /// A freshly registered run, waiting for submission.
    pub fn queued(run_id: Uuid, run_set_id: Uuid, record_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            engine_id: None,
            run_set_id,
            record_id: record_id.into(),
            submission_timestamp: now,
            status: CbasRunStatus::Queued,
            last_modified_timestamp: now,
            last_polled_timestamp: now,
            error_messages: None,
        }
    }

    pub fn with_status(mut self, status: CbasRunStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_error_messages(mut self, error_messages: impl Into<String>) -> Self {
        self.error_messages = Some(error_messages.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn non_terminal(&self) -> bool {
        self.status.non_terminal()
    }
}

impl<'r> FromRow<'r, PgRow> for Run {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status.parse::<CbasRunStatus>().map_err(|e| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: e.into(),
        })?;

        Ok(Self {
            run_id: row.try_get("run_id")?,
            engine_id: row.try_get("engine_id")?,
            run_set_id: row.try_get("run_set_id")?,
            record_id: row.try_get("record_id")?,
            submission_timestamp: row.try_get("submission_timestamp")?,
            status,
            last_modified_timestamp: row.try_get("last_modified_timestamp")?,
            last_polled_timestamp: row.try_get("last_polled_timestamp")?,
            error_messages: row.try_get("error_messages")?,
        })
    }
}

/// Filter for run queries; `None` fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunsFilter {
    pub run_id: Option<Uuid>,
    pub run_set_id: Option<Uuid>,
    pub statuses: Option<Vec<CbasRunStatus>>,
}

impl RunsFilter {
    pub fn for_run_set(run_set_id: Uuid) -> Self {
        Self {
            run_set_id: Some(run_set_id),
            ..Self::default()
        }
    }

    pub fn for_run(run_id: Uuid) -> Self {
        Self {
            run_id: Some(run_id),
            ..Self::default()
        }
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = CbasRunStatus>) -> Self {
        self.statuses = Some(statuses.into_iter().collect());
        self
    }

    pub fn non_terminal(run_set_id: Uuid) -> Self {
        Self::for_run_set(run_set_id).with_statuses(CbasRunStatus::NON_TERMINAL_STATES)
    }

    pub fn matches(&self, run: &Run) -> bool {
        self.run_id.map_or(true, |id| id == run.run_id)
            && self.run_set_id.map_or(true, |id| id == run.run_set_id)
            && self
                .statuses
                .as_ref()
                .map_or(true, |statuses| statuses.is_empty() || statuses.contains(&run.status))
    }
}

/// Number of runs in one status and the latest modification among them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusCount {
    pub count: i64,
    pub last_modified: Option<DateTime<Utc>>,
}
