//! Record source and sink: where run inputs are read from and outputs written to.

use async_trait::async_trait;
use thiserror::Error;

use super::auth::BearerToken;
use crate::models::{RecordAttributes, RecordResponse};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordSourceError {
    #[error("Record {record_type}/{record_id} not found")]
    NotFound { record_type: String, record_id: String },
    #[error("Record service error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Record service request failed: {0}")]
    Transient(String),
    #[error("Record client configuration error: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn get_record(
        &self,
        record_type: &str,
        record_id: &str,
        token: &BearerToken,
    ) -> Result<RecordResponse, RecordSourceError>;
}

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Merge `attributes` into an existing record.
    async fn update_record(
        &self,
        record_type: &str,
        record_id: &str,
        attributes: RecordAttributes,
    ) -> Result<(), RecordSourceError>;
}
