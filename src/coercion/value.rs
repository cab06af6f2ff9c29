use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::file::CbasFile;

/// A workflow parameter value after coercion against its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum CbasValue {
    String(String),
    Int(i64),
    Float(f64),
    Boolean(bool),
    File(CbasFile),
    Array(Vec<CbasValue>),
    /// Entries in source order; keys are primitive values
    Map(Vec<(CbasValue, CbasValue)>),
    /// Fields in declaration order
    Struct {
        name: String,
        fields: Vec<(String, CbasValue)>,
    },
    Optional(Option<Box<CbasValue>>),
}

impl CbasValue {
    pub fn none() -> Self {
        Self::Optional(None)
    }

    pub fn some(value: CbasValue) -> Self {
        Self::Optional(Some(Box::new(value)))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::Optional(None))
    }

    /// Render as the JSON value the workflow engine expects.
    ///
    /// Optional values collapse to their content (or `null`), struct fields that
    /// are `None` are left out, and map keys use their string form.
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Boolean(b) => Value::Bool(*b),
            Self::File(file) => Value::String(file.as_str().to_string()),
            Self::Array(values) => Value::Array(values.iter().map(Self::to_json).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.key_string(), value.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            Self::Struct { fields, .. } => Value::Object(
                fields
                    .iter()
                    .filter(|(_, value)| !value.is_none())
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            Self::Optional(Some(inner)) => inner.to_json(),
            Self::Optional(None) => Value::Null,
        }
    }

    /// Number of file references anywhere inside this value.
    pub fn count_files(&self) -> u64 {
        match self {
            Self::File(_) => 1,
            Self::String(_) | Self::Int(_) | Self::Float(_) | Self::Boolean(_) => 0,
            Self::Array(values) => values.iter().map(Self::count_files).sum(),
            Self::Map(entries) => entries
                .iter()
                .map(|(key, value)| key.count_files() + value.count_files())
                .sum(),
            Self::Struct { fields, .. } => {
                fields.iter().map(|(_, value)| value.count_files()).sum()
            }
            Self::Optional(inner) => inner.as_ref().map_or(0, |value| value.count_files()),
        }
    }

    fn key_string(&self) -> String {
        match self.to_json() {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }
}

impl Serialize for CbasValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn file(raw: &str) -> CbasValue {
        CbasValue::File(CbasFile::parse(raw).unwrap())
    }

    #[test]
    fn test_struct_serialization_skips_none_fields() {
        let value = CbasValue::Struct {
            name: "Sample".to_string(),
            fields: vec![
                ("name".to_string(), CbasValue::String("s1".to_string())),
                ("depth".to_string(), CbasValue::none()),
                ("reads".to_string(), CbasValue::some(file("gs://b/r.bam"))),
            ],
        };
        assert_eq!(value.to_json(), json!({"name": "s1", "reads": "gs://b/r.bam"}));
        assert_eq!(value.count_files(), 1);
    }

    #[test]
    fn test_map_keys_render_as_strings() {
        let value = CbasValue::Map(vec![
            (CbasValue::Int(1), file("gs://b/one")),
            (CbasValue::Int(2), file("gs://b/two")),
        ]);
        assert_eq!(value.to_json(), json!({"1": "gs://b/one", "2": "gs://b/two"}));
        assert_eq!(value.count_files(), 2);
    }

    #[test]
    fn test_serialize_delegates_to_json_form() {
        let value = CbasValue::Array(vec![CbasValue::Float(1.5), CbasValue::Int(2)]);
        assert_eq!(serde_json::to_string(&value).unwrap(), "[1.5,2]");
        assert_eq!(CbasValue::none().to_json(), Value::Null);
    }
}
