//! Configuration Loader
//!
//! Environment detection and layered loading through the `config` crate.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::ConfigResult;
use super::CbasConfig;
use crate::constants::environment;

const BASE_FILE_NAME: &str = "cbas";
const ENV_PREFIX: &str = "CBAS";

pub struct ConfigManager {
    config: CbasConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with an explicit environment,
    /// so tests do not have to touch process-wide variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_layers(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            max_workflows_in_batch = config.submission.max_workflows_in_batch,
            reconcile_interval_seconds = config.polling.reconcile_interval_seconds,
            engine_url = %config.engine.base_url,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first.
    pub fn from_config(config: CbasConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    pub fn config(&self) -> &CbasConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// CBAS_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        environment::detect().to_lowercase()
    }

    fn load_layers(config_directory: &Path, environment: &str) -> ConfigResult<CbasConfig> {
        let base_file = config_directory.join(format!("{BASE_FILE_NAME}.toml"));
        let env_file = config_directory.join(format!("{BASE_FILE_NAME}.{environment}.toml"));

        debug!(
            base_file = %base_file.display(),
            base_exists = base_file.exists(),
            env_file = %env_file.display(),
            env_exists = env_file.exists(),
            "Resolved configuration files"
        );

        let settings = config::Config::builder()
            .add_source(config::File::from(base_file).required(false))
            .add_source(config::File::from(env_file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize::<CbasConfig>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        assert_eq!(manager.environment(), "test");
        assert_eq!(manager.config().submission.max_record_ids, 100);
    }

    #[test]
    fn test_environment_file_overrides_base_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("cbas.toml"),
            r#"
[submission]
max_workflows_in_batch = 25
core_pool_size = 2
max_pool_size = 4

[polling]
min_seconds_between_run_status_polls = 10
"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("cbas.test.toml"),
            r#"
[submission]
max_workflows_in_batch = 5

[engine]
final_workflow_log_dir = "gs://bucket/logs"
"#,
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        let config = manager.config();
        assert_eq!(config.submission.max_workflows_in_batch, 5);
        assert_eq!(config.submission.core_pool_size, 2);
        assert_eq!(config.polling.min_seconds_between_run_status_polls, 10);
        assert_eq!(
            config.engine.final_workflow_log_dir.as_deref(),
            Some("gs://bucket/logs")
        );
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("cbas.toml"),
            "[submission]\ncore_pool_size = 8\nmax_pool_size = 2\n",
        )
        .unwrap();

        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(result.is_err());
    }
}
