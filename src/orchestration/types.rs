//! # Orchestration Types
//!
//! Request and response shapes shared by submission, cancellation and the
//! run set service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{WorkflowInputDefinition, WorkflowOutputDefinition};
use crate::state_machine::{CbasRunSetStatus, CbasRunStatus};

/// Local outcome of submitting one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStateResponse {
    pub run_id: Uuid,
    pub state: CbasRunStatus,
    pub errors: Option<String>,
}

impl RunStateResponse {
    pub fn new(run_id: Uuid, state: CbasRunStatus) -> Self {
        Self {
            run_id,
            state,
            errors: None,
        }
    }

    pub fn failed(run_id: Uuid, errors: impl Into<String>) -> Self {
        Self {
            run_id,
            state: CbasRunStatus::SystemError,
            errors: Some(errors.into()),
        }
    }

    pub fn canceled(run_id: Uuid, errors: impl Into<String>) -> Self {
        Self {
            run_id,
            state: CbasRunStatus::Canceled,
            errors: Some(errors.into()),
        }
    }
}

/// Records a run set is applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSelection {
    pub record_type: String,
    pub record_ids: Vec<String>,
}

/// A request to run one method version over a set of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSetRequest {
    pub run_set_name: Option<String>,
    pub run_set_description: Option<String>,
    pub method_version_id: Uuid,
    /// Defaults to enabled
    pub call_caching_enabled: Option<bool>,
    pub records: RecordSelection,
    pub workflow_input_definitions: Vec<WorkflowInputDefinition>,
    pub workflow_output_definitions: Vec<WorkflowOutputDefinition>,
    pub user_id: Option<String>,
    pub original_workspace_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSetSubmissionResponse {
    pub run_set_id: Uuid,
    pub runs: Vec<RunStateResponse>,
    pub state: CbasRunSetStatus,
}

/// Result of an abort request, by run id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbortRequestDetails {
    /// Runs whose cancellation the engine accepted
    pub submitted: Vec<Uuid>,
    /// Runs that could not be canceled
    pub failed: Vec<Uuid>,
}
