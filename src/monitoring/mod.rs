//! # Monitoring
//!
//! Reconciliation of local run and run set state with the execution engine.

use chrono::Duration;

pub mod run_sets_poller;
pub mod runs_poller;
pub mod scheduler;
pub mod time_limited_updater;

pub use run_sets_poller::{RunSetsPollResult, SmartRunSetsPoller};
pub use runs_poller::SmartRunsPoller;
pub use scheduler::ReconciliationScheduler;
pub use time_limited_updater::{TimeLimitedUpdateError, UpdateResult};

// Longer windows are clamped so deadline arithmetic cannot overflow.
const MAX_WINDOW_SECONDS: u64 = 365 * 24 * 60 * 60;

pub(crate) fn seconds(value: u64) -> Duration {
    Duration::seconds(value.min(MAX_WINDOW_SECONDS) as i64)
}
