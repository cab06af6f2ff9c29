//! # Output Builder
//!
//! Turns an engine's raw output map into record attribute updates.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::coercion::{parse_value, CoercionError};
use crate::models::{OutputDestination, RecordAttributes, WorkflowOutputDefinition};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OutputError {
    #[error("Output {0} not found in workflow outputs.")]
    OutputNotFound(String),
    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltOutputs {
    pub attributes: RecordAttributes,
    /// File references written back, across all outputs
    pub file_count: u64,
}

pub fn build_outputs(
    output_definitions: &[WorkflowOutputDefinition],
    engine_outputs: &Map<String, Value>,
) -> Result<BuiltOutputs, OutputError> {
    let mut built = BuiltOutputs::default();
    let null = Value::Null;

    for definition in output_definitions {
        let OutputDestination::RecordUpdate { record_attribute } = &definition.destination else {
            continue;
        };

        let raw = match engine_outputs.get(&definition.output_name) {
            Some(value) => value,
            None if definition.output_type.is_optional() => &null,
            None => return Err(OutputError::OutputNotFound(definition.output_name.clone())),
        };

        let value = parse_value(&definition.output_name, &definition.output_type, raw)?;
        built.file_count += value.count_files();
        built.attributes.insert(record_attribute.clone(), value.to_json());
    }

    Ok(built)
}
