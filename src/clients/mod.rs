//! # External Clients
//!
//! Trait seams for the services the core depends on (the workflow execution
//! engine and the record service) plus their HTTP implementations.

pub mod auth;
pub mod cromwell;
pub mod engine;
pub mod records;
pub mod wds;

pub use auth::BearerToken;
pub use cromwell::CromwellClient;
pub use engine::{
    compose_failure_message, EngineError, EngineRunSummary, ExecutionEngine, FailureMessage,
    WorkflowIdAndStatus, WorkflowOptions, MAX_FAILURE_MESSAGE_CHARS,
};
pub use records::{RecordSink, RecordSource, RecordSourceError};
pub use wds::WdsClient;
