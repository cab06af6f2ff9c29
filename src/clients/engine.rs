//! # Execution Engine Interface
//!
//! The operations the core needs from a workflow execution engine: batch
//! submission, status lookup, outputs, failure details, and cancellation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::auth::BearerToken;
use crate::state_machine::EngineStatus;

/// Longest error message stored on a run from the engine's failure chain.
pub const MAX_FAILURE_MESSAGE_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Engine API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Engine request failed: {0}")]
    Transport(String),
    #[error("Unexpected engine response: {0}")]
    InvalidResponse(String),
    #[error("Engine client configuration error: {0}")]
    Configuration(String),
}

/// One accepted workflow from a batch submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowIdAndStatus {
    pub id: Uuid,
    pub status: EngineStatus,
}

/// Engine view of a single workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRunSummary {
    pub id: Uuid,
    /// Absent when the engine has no status to report yet
    pub status: Option<EngineStatus>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// Options document shared by every workflow in a run set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOptions {
    pub final_workflow_log_dir: Option<String>,
    pub read_from_cache: bool,
    pub write_to_cache: bool,
}

impl WorkflowOptions {
    pub fn new(final_workflow_log_dir: Option<String>, call_caching_enabled: bool) -> Self {
        Self {
            final_workflow_log_dir,
            read_from_cache: call_caching_enabled,
            write_to_cache: call_caching_enabled,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A failure reported by the engine, possibly caused by further failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureMessage {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub caused_by: Vec<FailureMessage>,
}

/// Flatten the first failure of each level into `message (cause (cause))`, capped
/// at [`MAX_FAILURE_MESSAGE_CHARS`].
pub fn compose_failure_message(failures: &[FailureMessage]) -> String {
    let Some(first) = failures.first() else {
        return String::new();
    };

    let mut message = first.message.clone().unwrap_or_default();
    let caused_by = compose_failure_message(&first.caused_by);
    if !caused_by.is_empty() {
        message.push_str(" (");
        message.push_str(&caused_by);
        message.push(')');
    }

    if message.chars().count() > MAX_FAILURE_MESSAGE_CHARS {
        let truncated: String = message.chars().take(MAX_FAILURE_MESSAGE_CHARS - 3).collect();
        format!("{truncated}...")
    } else {
        message
    }
}

#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Submit one batch of workflows. `inputs` maps the requested engine id of each
    /// workflow to its JSON input document.
    async fn submit_batch(
        &self,
        workflow_url: &str,
        inputs: &IndexMap<Uuid, String>,
        workflow_options: &str,
        token: &BearerToken,
    ) -> Result<Vec<WorkflowIdAndStatus>, EngineError>;

    /// `Ok(None)` when the engine does not know the workflow.
    async fn run_summary(&self, engine_id: Uuid) -> Result<Option<EngineRunSummary>, EngineError>;

    async fn outputs(&self, engine_id: Uuid) -> Result<Map<String, Value>, EngineError>;

    /// Human-readable failure reason, empty when the engine reports none.
    async fn failure_message(&self, engine_id: Uuid) -> Result<String, EngineError>;

    async fn cancel(&self, engine_id: Uuid, token: &BearerToken) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn failure(message: &str, caused_by: Vec<FailureMessage>) -> FailureMessage {
        FailureMessage {
            message: Some(message.to_string()),
            caused_by,
        }
    }

    #[test]
    fn test_compose_failure_message_chain() {
        let failures = vec![
            failure(
                "Workflow failed",
                vec![failure("Task hello.greet failed", vec![failure("exit code 1", vec![])])],
            ),
            failure("ignored", vec![]),
        ];
        assert_eq!(
            compose_failure_message(&failures),
            "Workflow failed (Task hello.greet failed (exit code 1))"
        );
        assert_eq!(compose_failure_message(&[]), "");
    }

    #[test]
    fn test_compose_failure_message_truncates() {
        let long = "x".repeat(150);
        let message = compose_failure_message(&[failure(&long, vec![])]);
        assert_eq!(message.chars().count(), MAX_FAILURE_MESSAGE_CHARS);
        assert!(message.ends_with("..."));
    }

    #[test]
    fn test_failure_message_deserialization() {
        let raw = json!([{
            "message": "boom",
            "causedBy": [{ "message": "root", "causedBy": [] }]
        }]);
        let failures: Vec<FailureMessage> = serde_json::from_value(raw).unwrap();
        assert_eq!(compose_failure_message(&failures), "boom (root)");
    }

    #[test]
    fn test_workflow_options_json() {
        let options = WorkflowOptions::new(Some("gs://logs".to_string()), false);
        let value: Value = serde_json::from_str(&options.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "final_workflow_log_dir": "gs://logs",
                "read_from_cache": false,
                "write_to_cache": false
            })
        );
    }
}
