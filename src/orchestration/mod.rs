//! # Orchestration
//!
//! Run set submission and cancellation.
//!
//! ## Core Components
//!
//! - **RunSetsService**: validates and registers a run set, then dispatches its submission
//! - **SubmissionOrchestrator**: fetches records, builds inputs, and submits batches to the engine
//! - **RunCompletionHandler**: applies engine-observed statuses, writing outputs back on completion
//! - **RunSetAbortManager**: requests cancellation of a run set's unfinished runs
//! - **inputs / outputs**: conversion between records and workflow inputs and outputs

pub mod abort;
pub mod completion;
pub mod inputs;
pub mod outputs;
pub mod run_sets_service;
pub mod submission;
pub mod types;

pub use abort::RunSetAbortManager;
pub use completion::{CompletionOutcome, RunCompletionHandler};
pub use inputs::{build_inputs, count_input_files, inputs_to_json, InputError, WorkflowInputs};
pub use outputs::{build_outputs, BuiltOutputs, OutputError};
pub use run_sets_service::RunSetsService;
pub use submission::{SubmissionOrchestrator, SubmissionOutcome, SubmissionRequest};
pub use types::*;
