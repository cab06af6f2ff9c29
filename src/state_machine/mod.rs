// Run and run set lifecycle states.
//
// Runs move QUEUED -> INITIALIZING -> RUNNING -> terminal, with CANCELING in front of
// CANCELED. Run set status is never set directly by the engine: it is aggregated
// from the statuses of its runs.

pub mod engine_status;
pub mod states;

pub use engine_status::EngineStatus;
pub use states::{CbasRunSetStatus, CbasRunStatus};
