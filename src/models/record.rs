//! Records served by the external record source (a data table row).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl RecordResponse {
    pub fn new(
        id: impl Into<String>,
        record_type: impl Into<String>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            record_type: record_type.into(),
            attributes,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Attribute updates written back to a record.
pub type RecordAttributes = Map<String, Value>;
