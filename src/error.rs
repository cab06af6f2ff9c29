//! Crate-wide error type.
//!
//! Component errors (`CoercionError`, `EngineError`, `StoreError`, ...) stay close to
//! the code that raises them and convert into [`CbasError`] at the service boundary.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CbasError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Workflow engine error: {0}")]
    EngineError(String),
    #[error("Record source error: {0}")]
    RecordSourceError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Worker pool error: {0}")]
    WorkerPoolError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CbasError {
    fn from(error: serde_json::Error) -> Self {
        CbasError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for CbasError {
    fn from(err: sqlx::Error) -> Self {
        CbasError::DatabaseError(err.to_string())
    }
}

impl From<crate::database::StoreError> for CbasError {
    fn from(err: crate::database::StoreError) -> Self {
        CbasError::DatabaseError(err.to_string())
    }
}

impl From<crate::clients::EngineError> for CbasError {
    fn from(err: crate::clients::EngineError) -> Self {
        CbasError::EngineError(err.to_string())
    }
}

impl From<crate::clients::RecordSourceError> for CbasError {
    fn from(err: crate::clients::RecordSourceError) -> Self {
        CbasError::RecordSourceError(err.to_string())
    }
}

impl From<crate::config::ConfigurationError> for CbasError {
    fn from(err: crate::config::ConfigurationError) -> Self {
        CbasError::ConfigurationError(err.to_string())
    }
}

impl From<crate::execution::WorkerPoolError> for CbasError {
    fn from(err: crate::execution::WorkerPoolError) -> Self {
        CbasError::WorkerPoolError(err.to_string())
    }
}

impl From<crate::coercion::CoercionError> for CbasError {
    fn from(err: crate::coercion::CoercionError) -> Self {
        CbasError::ValidationError(err.to_string())
    }
}

impl From<crate::orchestration::InputError> for CbasError {
    fn from(err: crate::orchestration::InputError) -> Self {
        CbasError::ValidationError(err.to_string())
    }
}

impl From<crate::orchestration::OutputError> for CbasError {
    fn from(err: crate::orchestration::OutputError) -> Self {
        CbasError::ValidationError(err.to_string())
    }
}

impl From<crate::monitoring::TimeLimitedUpdateError> for CbasError {
    fn from(err: crate::monitoring::TimeLimitedUpdateError) -> Self {
        CbasError::InvalidState(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CbasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CbasError::NotFound("run set 42".to_string());
        assert_eq!(err.to_string(), "Not found: run set 42");
    }

    #[test]
    fn test_json_error_becomes_validation_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CbasError = json_err.into();
        assert!(matches!(err, CbasError::ValidationError(_)));
    }
}
