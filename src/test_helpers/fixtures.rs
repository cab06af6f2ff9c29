//! Builders for the models the integration tests need.

use chrono::{Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::clients::BearerToken;
use crate::models::{
    MethodVersion, OutputDestination, ParameterDefinition, ParameterTypeDefinition, PrimitiveType,
    RecordResponse, Run, RunSet, WorkflowInputDefinition, WorkflowOutputDefinition,
};
use crate::state_machine::{CbasRunSetStatus, CbasRunStatus};

pub const TEST_RECORD_TYPE: &str = "FOO";
pub const TEST_WORKFLOW_URL: &str = "https://example.com/workflows/hello.wdl";

pub fn test_token() -> BearerToken {
    BearerToken::new("test-token")
}

pub fn method_version() -> MethodVersion {
    MethodVersion {
        method_version_id: Uuid::new_v4(),
        method_id: Uuid::new_v4(),
        name: "1.0".to_string(),
        description: None,
        created: Utc::now(),
        url: TEST_WORKFLOW_URL.to_string(),
        branch_or_tag_name: None,
        last_run_set_id: None,
    }
}

/// `input_name` read from record attribute `attribute`.
pub fn record_lookup_input(
    input_name: &str,
    input_type: ParameterTypeDefinition,
    attribute: &str,
) -> WorkflowInputDefinition {
    WorkflowInputDefinition {
        input_name: input_name.to_string(),
        input_type,
        source: ParameterDefinition::RecordLookup {
            record_attribute: attribute.to_string(),
        },
    }
}

pub fn literal_input(
    input_name: &str,
    input_type: ParameterTypeDefinition,
    value: Value,
) -> WorkflowInputDefinition {
    WorkflowInputDefinition {
        input_name: input_name.to_string(),
        input_type,
        source: ParameterDefinition::Literal {
            parameter_value: value,
        },
    }
}

pub fn record_update_output(
    output_name: &str,
    output_type: ParameterTypeDefinition,
    attribute: &str,
) -> WorkflowOutputDefinition {
    WorkflowOutputDefinition {
        output_name: output_name.to_string(),
        output_type,
        destination: OutputDestination::RecordUpdate {
            record_attribute: attribute.to_string(),
        },
    }
}

/// Inputs used by most tests: `wf.hello.name` from the record's `foo_name`.
pub fn default_inputs() -> Vec<WorkflowInputDefinition> {
    vec![record_lookup_input(
        "wf.hello.name",
        ParameterTypeDefinition::primitive(PrimitiveType::String),
        "foo_name",
    )]
}

pub fn record(id: &str, attributes: Value) -> RecordResponse {
    let attributes = match attributes {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    RecordResponse::new(id, TEST_RECORD_TYPE, attributes)
}

pub fn run_set(
    method_version_id: Uuid,
    status: CbasRunSetStatus,
    inputs: &[WorkflowInputDefinition],
    outputs: &[WorkflowOutputDefinition],
) -> RunSet {
    let polled = Utc::now() - Duration::minutes(10);
    RunSet {
        run_set_id: Uuid::new_v4(),
        method_version_id,
        name: Some("test run set".to_string()),
        description: None,
        call_caching_enabled: true,
        is_template: false,
        status,
        submission_timestamp: polled,
        last_modified_timestamp: polled,
        last_polled_timestamp: polled,
        run_count: 0,
        error_count: 0,
        input_definition: serde_json::to_string(inputs).unwrap_or_else(|_| "[]".to_string()),
        output_definition: serde_json::to_string(outputs).unwrap_or_else(|_| "[]".to_string()),
        record_type: TEST_RECORD_TYPE.to_string(),
        user_id: None,
        original_workspace_id: None,
    }
}

/// A run last polled ten minutes ago, so it is due for polling.
pub fn run(
    run_set_id: Uuid,
    record_id: &str,
    status: CbasRunStatus,
    engine_id: Option<Uuid>,
) -> Run {
    let mut run = Run::queued(Uuid::new_v4(), run_set_id, record_id).with_status(status);
    let polled = Utc::now() - Duration::minutes(10);
    run.engine_id = engine_id;
    run.submission_timestamp = polled;
    run.last_modified_timestamp = polled;
    run.last_polled_timestamp = polled;
    run
}
