//! # Input Builder
//!
//! Materializes a workflow's input document from the run set's input definitions
//! and one record.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::coercion::{parse_value, CbasValue, CoercionError};
use crate::models::{
    ObjectBuilderField, ParameterDefinition, ParameterTypeDefinition, RecordResponse,
    WorkflowInputDefinition,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("Attribute {attribute} not found in record {record_id} (required by input {input_name})")]
    AttributeNotFound {
        attribute: String,
        record_id: String,
        input_name: String,
    },
    #[error("Field {field_name} of Struct ({struct_name}) has no source in the object builder")]
    StructMissingField {
        field_name: String,
        struct_name: String,
    },
    #[error("Input {input_name} of type {input_type} cannot be assembled by an object builder")]
    InappropriateSource {
        input_name: String,
        input_type: String,
    },
    #[error(transparent)]
    Coercion(#[from] CoercionError),
    #[error("Failed to serialize workflow inputs: {0}")]
    Serialization(String),
}

/// Typed inputs keyed by input name. Ordered so the engine document is stable.
pub type WorkflowInputs = BTreeMap<String, CbasValue>;

/// Build every input for `record`. Inputs without a value (source `None`, or an
/// optional that resolved to nothing) are left out.
pub fn build_inputs(
    input_definitions: &[WorkflowInputDefinition],
    record: &RecordResponse,
) -> Result<WorkflowInputs, InputError> {
    let mut inputs = WorkflowInputs::new();
    for definition in input_definitions {
        if let Some(value) = build_input(
            &definition.input_name,
            &definition.input_type,
            &definition.source,
            record,
        )? {
            inputs.insert(definition.input_name.clone(), value);
        }
    }
    Ok(inputs)
}

fn build_input(
    input_name: &str,
    input_type: &ParameterTypeDefinition,
    source: &ParameterDefinition,
    record: &RecordResponse,
) -> Result<Option<CbasValue>, InputError> {
    let raw = match source {
        ParameterDefinition::Literal { parameter_value } => parameter_value.clone(),
        ParameterDefinition::None => return Ok(None),
        ParameterDefinition::RecordLookup { record_attribute } => record
            .attribute(record_attribute)
            .cloned()
            .ok_or_else(|| InputError::AttributeNotFound {
                attribute: record_attribute.clone(),
                record_id: record.id.clone(),
                input_name: input_name.to_string(),
            })?,
        ParameterDefinition::ObjectBuilder { fields } => {
            build_object(input_name, input_type, fields, record)?
        }
    };

    let value = parse_value(input_name, input_type, &raw)?;
    Ok((!value.is_none()).then_some(value))
}

fn build_object(
    input_name: &str,
    input_type: &ParameterTypeDefinition,
    builder_fields: &[ObjectBuilderField],
    record: &RecordResponse,
) -> Result<Value, InputError> {
    let ParameterTypeDefinition::Struct { name, fields } = input_type else {
        return Err(InputError::InappropriateSource {
            input_name: input_name.to_string(),
            input_type: input_type.to_string(),
        });
    };

    let mut object = Map::new();
    for field in fields {
        let source = builder_fields
            .iter()
            .find(|builder_field| builder_field.name == field.field_name)
            .map(|builder_field| &builder_field.source)
            .ok_or_else(|| InputError::StructMissingField {
                field_name: field.field_name.clone(),
                struct_name: name.clone(),
            })?;

        if let Some(value) = build_input(&field.field_name, &field.field_type, source, record)? {
            object.insert(field.field_name.clone(), value.to_json());
        }
    }
    Ok(Value::Object(object))
}

/// Serialize inputs as the engine's JSON input document (keys sorted).
pub fn inputs_to_json(inputs: &WorkflowInputs) -> Result<String, InputError> {
    serde_json::to_string(inputs).map_err(|e| InputError::Serialization(e.to_string()))
}

/// Number of file references across all inputs.
pub fn count_input_files(inputs: &WorkflowInputs) -> u64 {
    inputs.values().map(CbasValue::count_files).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PrimitiveType, StructField};
    use serde_json::json;

    fn record(attributes: Value) -> RecordResponse {
        let Value::Object(attributes) = attributes else {
            panic!("attributes must be an object");
        };
        RecordResponse::new("FOO1", "FOO", attributes)
    }

    fn input(
        name: &str,
        input_type: ParameterTypeDefinition,
        source: ParameterDefinition,
    ) -> WorkflowInputDefinition {
        WorkflowInputDefinition {
            input_name: name.to_string(),
            input_type,
            source,
        }
    }

    fn lookup(attribute: &str) -> ParameterDefinition {
        ParameterDefinition::RecordLookup {
            record_attribute: attribute.to_string(),
        }
    }

    fn prim(t: PrimitiveType) -> ParameterTypeDefinition {
        ParameterTypeDefinition::primitive(t)
    }

    #[test]
    fn test_literal_and_lookup_inputs() {
        let definitions = vec![
            input("wf.name", prim(PrimitiveType::String), lookup("sample_name")),
            input(
                "wf.threads",
                prim(PrimitiveType::Int),
                ParameterDefinition::Literal {
                    parameter_value: json!(4),
                },
            ),
            input("wf.reads", prim(PrimitiveType::File), lookup("reads")),
        ];
        let rec = record(json!({"sample_name": "s1", "reads": "gs://bucket/s1.bam", "unused": 1}));

        let inputs = build_inputs(&definitions, &rec).unwrap();
        assert_eq!(inputs.len(), 3);
        assert_eq!(count_input_files(&inputs), 1);
        assert_eq!(
            inputs_to_json(&inputs).unwrap(),
            r#"{"wf.name":"s1","wf.reads":"gs://bucket/s1.bam","wf.threads":4}"#
        );
    }

    #[test]
    fn test_missing_attribute_fails() {
        let definitions = vec![input("wf.name", prim(PrimitiveType::String), lookup("absent"))];
        let err = build_inputs(&definitions, &record(json!({}))).unwrap_err();
        assert_eq!(
            err,
            InputError::AttributeNotFound {
                attribute: "absent".to_string(),
                record_id: "FOO1".to_string(),
                input_name: "wf.name".to_string(),
            }
        );
    }

    #[test]
    fn test_none_and_null_optional_inputs_are_omitted() {
        let definitions = vec![
            input("wf.skip", prim(PrimitiveType::String), ParameterDefinition::None),
            input(
                "wf.maybe",
                ParameterTypeDefinition::optional(prim(PrimitiveType::Int)),
                lookup("depth"),
            ),
        ];
        let inputs = build_inputs(&definitions, &record(json!({"depth": null}))).unwrap();
        assert!(inputs.is_empty());
        assert_eq!(inputs_to_json(&inputs).unwrap(), "{}");
    }

    #[test]
    fn test_coercion_failure_is_reported() {
        let definitions = vec![input("wf.count", prim(PrimitiveType::Int), lookup("count"))];
        let err = build_inputs(&definitions, &record(json!({"count": "many"}))).unwrap_err();
        assert!(matches!(err, InputError::Coercion(ref e) if e.is_type_error()));
    }

    #[test]
    fn test_object_builder_input() {
        let sample = ParameterTypeDefinition::Struct {
            name: "Sample".to_string(),
            fields: vec![
                StructField {
                    field_name: "id".to_string(),
                    field_type: prim(PrimitiveType::String),
                },
                StructField {
                    field_name: "depth".to_string(),
                    field_type: ParameterTypeDefinition::optional(prim(PrimitiveType::Int)),
                },
                StructField {
                    field_name: "bam".to_string(),
                    field_type: prim(PrimitiveType::File),
                },
            ],
        };
        let builder = ParameterDefinition::ObjectBuilder {
            fields: vec![
                ObjectBuilderField {
                    name: "id".to_string(),
                    source: lookup("sample_name"),
                },
                ObjectBuilderField {
                    name: "depth".to_string(),
                    source: ParameterDefinition::None,
                },
                ObjectBuilderField {
                    name: "bam".to_string(),
                    source: ParameterDefinition::Literal {
                        parameter_value: json!("gs://bucket/x.bam"),
                    },
                },
            ],
        };
        let definitions = vec![input("wf.sample", sample.clone(), builder)];
        let inputs = build_inputs(&definitions, &record(json!({"sample_name": "s1"}))).unwrap();
        assert_eq!(
            inputs["wf.sample"].to_json(),
            json!({"id": "s1", "bam": "gs://bucket/x.bam"})
        );

        let incomplete = ParameterDefinition::ObjectBuilder {
            fields: vec![ObjectBuilderField {
                name: "id".to_string(),
                source: lookup("sample_name"),
            }],
        };
        let err = build_inputs(
            &[input("wf.sample", sample, incomplete.clone())],
            &record(json!({"sample_name": "s1"})),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            InputError::StructMissingField { ref field_name, .. } if field_name == "depth"
        ));

        let err = build_inputs(
            &[input("wf.name", prim(PrimitiveType::String), incomplete)],
            &record(json!({"sample_name": "s1"})),
        )
        .unwrap_err();
        assert!(matches!(err, InputError::InappropriateSource { .. }));
    }
}
