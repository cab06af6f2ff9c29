use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Run lifecycle states.
///
/// Stored and serialized as upper-case names (`"SYSTEM_ERROR"`), which is also the
/// representation used in the `run.status` column.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CbasRunStatus {
    /// Created locally, not yet handed to the engine
    #[default]
    Queued,
    /// Accepted by the engine, waiting to start
    Initializing,
    /// Executing in the engine
    Running,
    /// Finished successfully
    Complete,
    /// The workflow itself failed in the engine
    ExecutorError,
    /// A local failure prevented the workflow from running or being tracked
    SystemError,
    /// Abort requested, engine has not confirmed yet
    Canceling,
    /// Aborted by the engine
    Canceled,
}

impl CbasRunStatus {
    pub const ALL: [CbasRunStatus; 8] = [
        Self::Queued,
        Self::Initializing,
        Self::Running,
        Self::Complete,
        Self::ExecutorError,
        Self::SystemError,
        Self::Canceling,
        Self::Canceled,
    ];

    pub const TERMINAL_STATES: [CbasRunStatus; 4] = [
        Self::Complete,
        Self::ExecutorError,
        Self::SystemError,
        Self::Canceled,
    ];

    pub const NON_TERMINAL_STATES: [CbasRunStatus; 4] = [
        Self::Queued,
        Self::Initializing,
        Self::Running,
        Self::Canceling,
    ];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete | Self::ExecutorError | Self::SystemError | Self::Canceled
        )
    }

    pub fn non_terminal(&self) -> bool {
        !self.is_terminal()
    }

    pub fn in_error_state(&self) -> bool {
        matches!(self, Self::ExecutorError | Self::SystemError)
    }

    /// Whether `next` is reachable from `self` under the run state machine.
    ///
    /// Re-asserting the current state and anything out of a terminal state are
    /// rejected, so callers can treat `false` as "nothing to write".
    ///
    /// A canceling run may also settle as `Complete` or `ExecutorError` when the
    /// engine finished the workflow before the abort took effect.
    pub fn can_transition_to(&self, next: CbasRunStatus) -> bool {
        use CbasRunStatus::*;

        if self.is_terminal() || *self == next {
            return false;
        }

        match self {
            Queued => next != Queued,
            Initializing => !matches!(next, Queued),
            Running => !matches!(next, Queued | Initializing),
            Canceling => matches!(next, Canceled | Complete | ExecutorError | SystemError),
            Complete | ExecutorError | SystemError | Canceled => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Initializing => "INITIALIZING",
            Self::Running => "RUNNING",
            Self::Complete => "COMPLETE",
            Self::ExecutorError => "EXECUTOR_ERROR",
            Self::SystemError => "SYSTEM_ERROR",
            Self::Canceling => "CANCELING",
            Self::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for CbasRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CbasRunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid run status: {s}"))
    }
}

/// Run set lifecycle states, derived from the statuses of the set's runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CbasRunSetStatus {
    /// Registered, submission has not finished yet
    #[default]
    Queued,
    Running,
    Complete,
    Error,
    Canceling,
    Canceled,
}

impl CbasRunSetStatus {
    pub const ALL: [CbasRunSetStatus; 6] = [
        Self::Queued,
        Self::Running,
        Self::Complete,
        Self::Error,
        Self::Canceling,
        Self::Canceled,
    ];

    pub const NON_TERMINAL_STATES: [CbasRunSetStatus; 3] =
        [Self::Queued, Self::Running, Self::Canceling];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Canceled)
    }

    pub fn non_terminal(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Complete => "COMPLETE",
            Self::Error => "ERROR",
            Self::Canceling => "CANCELING",
            Self::Canceled => "CANCELED",
        }
    }

    /// Aggregate run status counts into a run set status.
    ///
    /// Precedence: canceling, canceled, error, any other non-terminal run, complete.
    /// A set without runs is complete.
    pub fn from_run_statuses(run_status_counts: &HashMap<CbasRunStatus, i64>) -> Self {
        let has = |predicate: fn(&CbasRunStatus) -> bool| {
            run_status_counts
                .iter()
                .any(|(status, count)| *count > 0 && predicate(status))
        };

        if has(|s| *s == CbasRunStatus::Canceling) {
            Self::Canceling
        } else if has(|s| *s == CbasRunStatus::Canceled) {
            Self::Canceled
        } else if has(CbasRunStatus::in_error_state) {
            Self::Error
        } else if has(CbasRunStatus::non_terminal) {
            Self::Running
        } else {
            Self::Complete
        }
    }
}

impl fmt::Display for CbasRunSetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CbasRunSetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid run set status: {s}"))
    }
}
