use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::states::CbasRunStatus;

/// Workflow status vocabulary reported by the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EngineStatus {
    Submitted,
    OnHold,
    Running,
    Aborting,
    Aborted,
    Failed,
    Succeeded,
    /// Anything the engine reports that is not in the list above
    Unknown(String),
}

impl EngineStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Submitted" => Self::Submitted,
            "On Hold" => Self::OnHold,
            "Running" => Self::Running,
            "Aborting" => Self::Aborting,
            "Aborted" => Self::Aborted,
            "Failed" => Self::Failed,
            "Succeeded" => Self::Succeeded,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Submitted => "Submitted",
            Self::OnHold => "On Hold",
            Self::Running => "Running",
            Self::Aborting => "Aborting",
            Self::Aborted => "Aborted",
            Self::Failed => "Failed",
            Self::Succeeded => "Succeeded",
            Self::Unknown(raw) => raw,
        }
    }

    /// The local run status this engine status corresponds to, if any.
    pub fn to_run_status(&self) -> Option<CbasRunStatus> {
        match self {
            Self::Submitted | Self::OnHold => Some(CbasRunStatus::Initializing),
            Self::Running => Some(CbasRunStatus::Running),
            Self::Aborting => Some(CbasRunStatus::Canceling),
            Self::Aborted => Some(CbasRunStatus::Canceled),
            Self::Failed => Some(CbasRunStatus::ExecutorError),
            Self::Succeeded => Some(CbasRunStatus::Complete),
            Self::Unknown(_) => None,
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EngineStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EngineStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

impl From<&str> for EngineStatus {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}
