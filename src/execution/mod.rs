//! # Execution
//!
//! Background execution of run set submissions.

pub mod worker_pool;

pub use worker_pool::{SubmissionWorkerPool, WorkerPoolError};
