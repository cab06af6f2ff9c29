//! # Run Set Model
//!
//! One batch submission request: a method version applied to a list of records.
//!
//! ## Database Schema
//!
//! Maps to the `run_set` table:
//! ```sql
//! CREATE TABLE run_set (
//!   run_set_id UUID PRIMARY KEY,
//!   method_version_id UUID NOT NULL,
//!   run_set_name VARCHAR,
//!   run_set_description VARCHAR,
//!   call_caching_enabled BOOLEAN NOT NULL DEFAULT true,
//!   is_template BOOLEAN NOT NULL DEFAULT false,
//!   status VARCHAR NOT NULL,
//!   submission_timestamp TIMESTAMPTZ NOT NULL,
//!   last_modified_timestamp TIMESTAMPTZ NOT NULL,
//!   last_polled_timestamp TIMESTAMPTZ NOT NULL,
//!   run_count INTEGER NOT NULL DEFAULT 0,
//!   error_count INTEGER NOT NULL DEFAULT 0,
//!   input_definition TEXT NOT NULL,
//!   output_definition TEXT NOT NULL,
//!   record_type VARCHAR NOT NULL,
//!   user_id VARCHAR,
//!   original_workspace_id UUID
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

use crate::models::definitions::{WorkflowInputDefinition, WorkflowOutputDefinition};
use crate::state_machine::CbasRunSetStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSet {
    pub run_set_id: Uuid,
    pub method_version_id: Uuid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub call_caching_enabled: bool,
    pub is_template: bool,
    pub status: CbasRunSetStatus,
    pub submission_timestamp: DateTime<Utc>,
    pub last_modified_timestamp: DateTime<Utc>,
    pub last_polled_timestamp: DateTime<Utc>,
    pub run_count: i32,
    pub error_count: i32,
    /// JSON-encoded `Vec<WorkflowInputDefinition>`
    pub input_definition: String,
    /// JSON-encoded `Vec<WorkflowOutputDefinition>`
    pub output_definition: String,
    pub record_type: String,
    pub user_id: Option<String>,
    pub original_workspace_id: Option<Uuid>,
}

impl RunSet {
    pub fn input_definitions(&self) -> Result<Vec<WorkflowInputDefinition>, serde_json::Error> {
        serde_json::from_str(&self.input_definition)
    }

    pub fn output_definitions(&self) -> Result<Vec<WorkflowOutputDefinition>, serde_json::Error> {
        serde_json::from_str(&self.output_definition)
    }
}

impl<'r> FromRow<'r, PgRow> for RunSet {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<CbasRunSetStatus>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: e.into(),
            })?;

        Ok(Self {
            run_set_id: row.try_get("run_set_id")?,
            method_version_id: row.try_get("method_version_id")?,
            name: row.try_get("run_set_name")?,
            description: row.try_get("run_set_description")?,
            call_caching_enabled: row.try_get("call_caching_enabled")?,
            is_template: row.try_get("is_template")?,
            status,
            submission_timestamp: row.try_get("submission_timestamp")?,
            last_modified_timestamp: row.try_get("last_modified_timestamp")?,
            last_polled_timestamp: row.try_get("last_polled_timestamp")?,
            run_count: row.try_get("run_count")?,
            error_count: row.try_get("error_count")?,
            input_definition: row.try_get("input_definition")?,
            output_definition: row.try_get("output_definition")?,
            record_type: row.try_get("record_type")?,
            user_id: row.try_get("user_id")?,
            original_workspace_id: row.try_get("original_workspace_id")?,
        })
    }
}
