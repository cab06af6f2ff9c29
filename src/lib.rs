#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # CBAS Core Rust
//!
//! Batch workflow submission, status reconciliation, and cancellation for run
//! sets: one workflow method executed over many data-table records.
//!
//! ## Overview
//!
//! A run set applies one method version to a list of records. Each record becomes
//! a run; runs are submitted to the execution engine in batches, tracked through
//! the engine's status vocabulary, and their outputs are written back to the
//! record they came from.
//!
//! ## Architecture
//!
//! - Submission happens off the request path on a bounded worker pool, one run
//!   set per worker, batches in sequence.
//! - Every persisted write is a small, independent, idempotent update.
//! - A periodic single-flight reconciliation sweep re-reads engine state and
//!   converges runs and run sets, so a lost write is repaired on the next pass.
//!
//! ## Module Organization
//!
//! - [`coercion`] - Typed parsing of raw JSON values against declared parameter types
//! - [`orchestration`] - Run set registration, submission, completion, and abort
//! - [`monitoring`] - Deadline-bounded run and run set reconciliation
//! - [`execution`] - Worker pool for background submission
//! - [`clients`] - Execution engine and record service interfaces and HTTP clients
//! - [`database`] - Run and run set persistence
//! - [`models`] - Run, run set, method, record, and definition types
//! - [`state_machine`] - Run and run set statuses and the engine status mapping
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cbas_core::config::ConfigManager;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! println!(
//!     "Batches of up to {} workflows",
//!     manager.config().submission.max_workflows_in_batch
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod clients;
pub mod coercion;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod execution;
pub mod logging;
pub mod models;
pub mod monitoring;
pub mod orchestration;
pub mod state_machine;
pub mod test_helpers;

pub use clients::{
    BearerToken, CromwellClient, ExecutionEngine, RecordSink, RecordSource, WdsClient,
};
pub use coercion::{parse_value, CbasFile, CbasValue, CoercionError};
pub use config::{CbasConfig, ConfigManager};
pub use database::{DatabaseConnection, PgRunStore, RunStore};
pub use error::{CbasError, Result};
pub use execution::SubmissionWorkerPool;
pub use monitoring::{ReconciliationScheduler, SmartRunSetsPoller, SmartRunsPoller};
pub use orchestration::{
    RunCompletionHandler, RunSetAbortManager, RunSetsService, SubmissionOrchestrator,
};
pub use state_machine::{CbasRunSetStatus, CbasRunStatus, EngineStatus};
