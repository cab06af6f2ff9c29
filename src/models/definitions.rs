//! # Parameter Definitions
//!
//! Serialized descriptions of a method's inputs and outputs, stored on the run set
//! as JSON. A definition pairs a declared type with a source (for inputs) or a
//! destination (for outputs).
//!
//! ```json
//! {
//!   "input_name": "hello.name",
//!   "input_type": { "type": "primitive", "primitive_type": "String" },
//!   "source": { "type": "record_lookup", "record_attribute": "sample_name" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    String,
    Int,
    Float,
    Boolean,
    File,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "String",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::File => "File",
        };
        f.write_str(name)
    }
}

/// Declared type of a workflow parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterTypeDefinition {
    Primitive {
        primitive_type: PrimitiveType,
    },
    Optional {
        optional_type: Box<ParameterTypeDefinition>,
    },
    Array {
        array_type: Box<ParameterTypeDefinition>,
        #[serde(default)]
        non_empty: bool,
    },
    Map {
        key_type: PrimitiveType,
        value_type: Box<ParameterTypeDefinition>,
    },
    Struct {
        name: String,
        fields: Vec<StructField>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    pub field_name: String,
    pub field_type: ParameterTypeDefinition,
}

impl ParameterTypeDefinition {
    pub fn primitive(primitive_type: PrimitiveType) -> Self {
        Self::Primitive { primitive_type }
    }

    pub fn optional(inner: ParameterTypeDefinition) -> Self {
        Self::Optional {
            optional_type: Box::new(inner),
        }
    }

    pub fn array(inner: ParameterTypeDefinition, non_empty: bool) -> Self {
        Self::Array {
            array_type: Box::new(inner),
            non_empty,
        }
    }

    pub fn map(key_type: PrimitiveType, value_type: ParameterTypeDefinition) -> Self {
        Self::Map {
            key_type,
            value_type: Box::new(value_type),
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional { .. })
    }
}

impl fmt::Display for ParameterTypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive { primitive_type } => write!(f, "{primitive_type}"),
            Self::Optional { optional_type } => write!(f, "{optional_type}?"),
            Self::Array { array_type, .. } => write!(f, "Array[{array_type}]"),
            Self::Map {
                key_type,
                value_type,
            } => write!(f, "Map[{key_type}, {value_type}]"),
            Self::Struct { name, .. } => write!(f, "Struct ({name})"),
        }
    }
}

/// Where an input value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterDefinition {
    Literal { parameter_value: Value },
    RecordLookup { record_attribute: String },
    ObjectBuilder { fields: Vec<ObjectBuilderField> },
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectBuilderField {
    pub name: String,
    pub source: ParameterDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInputDefinition {
    pub input_name: String,
    pub input_type: ParameterTypeDefinition,
    pub source: ParameterDefinition,
}

/// Where an output value goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputDestination {
    RecordUpdate { record_attribute: String },
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOutputDefinition {
    pub output_name: String,
    pub output_type: ParameterTypeDefinition,
    pub destination: OutputDestination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_definition_deserialization() {
        let raw = json!({
            "input_name": "wf.files",
            "input_type": {
                "type": "array",
                "array_type": { "type": "primitive", "primitive_type": "File" },
                "non_empty": true
            },
            "source": { "type": "record_lookup", "record_attribute": "files" }
        });

        let def: WorkflowInputDefinition = serde_json::from_value(raw).unwrap();
        assert_eq!(def.input_name, "wf.files");
        assert_eq!(
            def.input_type,
            ParameterTypeDefinition::array(
                ParameterTypeDefinition::primitive(PrimitiveType::File),
                true
            )
        );
        assert_eq!(
            def.source,
            ParameterDefinition::RecordLookup {
                record_attribute: "files".to_string()
            }
        );
    }

    #[test]
    fn test_type_display() {
        let t = ParameterTypeDefinition::map(
            PrimitiveType::String,
            ParameterTypeDefinition::optional(ParameterTypeDefinition::primitive(
                PrimitiveType::Int
            )),
        );
        assert_eq!(t.to_string(), "Map[String, Int?]");
        let s = ParameterTypeDefinition::Struct {
            name: "Sample".to_string(),
            fields: vec![],
        };
        assert_eq!(s.to_string(), "Struct (Sample)");
    }

    #[test]
    fn test_output_destination_none() {
        let def: WorkflowOutputDefinition = serde_json::from_value(json!({
            "output_name": "wf.log",
            "output_type": { "type": "primitive", "primitive_type": "File" },
            "destination": { "type": "none" }
        }))
        .unwrap();
        assert_eq!(def.destination, OutputDestination::None);
        assert!(!def.output_type.is_optional());
    }
}
