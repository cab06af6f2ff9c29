//! # Data Models
//!
//! Persistent entities (run sets, runs, methods) plus the serialized parameter
//! definitions and record payloads they carry.

pub mod definitions;
pub mod method;
pub mod record;
pub mod run;
pub mod run_set;

pub use definitions::{
    ObjectBuilderField, OutputDestination, ParameterDefinition, ParameterTypeDefinition,
    PrimitiveType, StructField, WorkflowInputDefinition, WorkflowOutputDefinition,
};
pub use method::{Method, MethodVersion};
pub use record::{RecordAttributes, RecordResponse};
pub use run::{Run, RunsFilter, StatusCount};
pub use run_set::RunSet;
