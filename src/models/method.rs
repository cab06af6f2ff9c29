//! Methods and method versions are read-only inputs: the workflow document a run
//! set executes and where it came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Method {
    pub method_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    pub method_source: String,
    pub last_run_set_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MethodVersion {
    pub method_version_id: Uuid,
    pub method_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    /// Resolved workflow document URL handed to the engine
    pub url: String,
    pub branch_or_tag_name: Option<String>,
    pub last_run_set_id: Option<Uuid>,
}
