//! # CBAS Configuration
//!
//! Layered, environment-aware configuration for the submission and reconciliation
//! core.
//!
//! ## Sources (later wins)
//!
//! 1. `config/cbas.toml`
//! 2. `config/cbas.{environment}.toml`
//! 3. Environment variables `CBAS__{SECTION}__{KEY}` (e.g. `CBAS__DATABASE__URL`)
//!
//! Every section has defaults, so an empty or missing file still yields a usable
//! development configuration.
//!
//! ```rust,no_run
//! use cbas_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let batch_size = manager.config().submission.max_workflows_in_batch;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CbasConfig {
    pub database: DatabaseConfig,
    pub submission: SubmissionConfig,
    pub polling: PollingConfig,
    pub engine: EngineConfig,
    pub records: RecordsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/cbas_development".to_string(),
            max_connections: 10,
            acquire_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

/// Batch submission and the worker pool that runs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub max_workflows_in_batch: usize,
    pub max_record_ids: usize,
    pub core_pool_size: usize,
    pub max_pool_size: usize,
    pub queue_capacity: usize,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_workflows_in_batch: 100,
            max_record_ids: 100,
            core_pool_size: 5,
            max_pool_size: 10,
            queue_capacity: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Time budget for one pass over the runs of a run set
    pub max_smart_poll_run_update_seconds: u64,
    /// Time budget for one pass over all run sets
    pub max_smart_poll_run_set_update_seconds: u64,
    /// A run is not re-polled until this long after its last poll
    pub min_seconds_between_run_status_polls: u64,
    /// Delay between the end of one reconciliation sweep and the start of the next
    pub reconcile_interval_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_smart_poll_run_update_seconds: 30,
            max_smart_poll_run_set_update_seconds: 60,
            min_seconds_between_run_status_polls: 30,
            reconcile_interval_seconds: 30,
        }
    }
}

impl PollingConfig {
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_url: String,
    pub final_workflow_log_dir: Option<String>,
    pub timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            final_workflow_log_dir: None,
            timeout_ms: 30000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordsConfig {
    pub base_url: String,
    pub instance_id: String,
    pub timeout_ms: u64,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            instance_id: "default".to_string(),
            timeout_ms: 30000,
        }
    }
}

impl CbasConfig {
    /// Reject values the core cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("database.url"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                self.database.max_connections,
                "must be greater than zero",
            ));
        }

        let submission = &self.submission;
        for (field, value) in [
            ("submission.max_workflows_in_batch", submission.max_workflows_in_batch),
            ("submission.max_record_ids", submission.max_record_ids),
            ("submission.core_pool_size", submission.core_pool_size),
            ("submission.queue_capacity", submission.queue_capacity),
        ] {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    "must be greater than zero",
                ));
            }
        }
        if submission.max_pool_size < submission.core_pool_size {
            return Err(ConfigurationError::invalid_value(
                "submission.max_pool_size",
                submission.max_pool_size,
                format!("must be at least core_pool_size ({})", submission.core_pool_size),
            ));
        }

        if self.polling.max_smart_poll_run_set_update_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "polling.max_smart_poll_run_set_update_seconds",
                0,
                "must be greater than zero",
            ));
        }

        for (field, value) in [
            ("engine.base_url", &self.engine.base_url),
            ("records.base_url", &self.records.base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ConfigurationError::invalid_value(field, value, e.to_string()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CbasConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.submission.max_workflows_in_batch, 100);
        assert_eq!(config.polling.reconcile_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = CbasConfig::default();
        config.submission.max_workflows_in_batch = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { ref field, .. })
                if field == "submission.max_workflows_in_batch"
        ));

        let mut config = CbasConfig::default();
        config.submission.max_pool_size = 1;
        assert!(config.validate().is_err());

        let mut config = CbasConfig::default();
        config.engine.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = CbasConfig::default();
        config.database.url = String::new();
        assert!(matches!(config.validate(), Err(ConfigurationError::MissingRequiredField(_))));
    }
}
