//! # Structured Logging Module
//!
//! Environment-aware structured logging to the console and to a JSON log file,
//! for following submissions and reconciliation sweeps across async workers.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

use crate::constants::environment;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs anything. If another
/// global subscriber is already set, that subscriber is kept.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let log_dir = PathBuf::from(environment::LOG_DIRECTORY);
        let file_layer_guard = fs::create_dir_all(&log_dir).ok().map(|_| {
            let pid = process::id();
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
            let file_name = format!("{environment}.{pid}.{timestamp}.log");
            let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
            (tracing_appender::non_blocking(file_appender), log_dir.join(file_name))
        });

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(env_filter(&log_level));

        match file_layer_guard {
            Some(((file_writer, guard), log_path)) => {
                let file_layer = fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(env_filter(&log_level));

                if tracing_subscriber::registry()
                    .with(console_layer)
                    .with(file_layer)
                    .try_init()
                    .is_err()
                {
                    tracing::debug!("Global tracing subscriber already initialized, keeping it");
                }

                tracing::info!(
                    pid = process::id(),
                    environment = %environment,
                    log_file = %log_path.display(),
                    "Structured logging initialized with file output"
                );
                // The writer must outlive every subscriber that references it
                std::mem::forget(guard);
            }
            None => {
                if tracing_subscriber::registry()
                    .with(console_layer)
                    .try_init()
                    .is_err()
                {
                    tracing::debug!("Global tracing subscriber already initialized, keeping it");
                }
                tracing::warn!(
                    environment = %environment,
                    "Log directory unavailable, logging to console only"
                );
            }
        }
    });
}

/// `RUST_LOG` wins over the environment default.
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn get_environment() -> String {
    environment::detect()
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for run set operations
pub fn log_run_set_operation(
    operation: &str,
    run_set_id: Uuid,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        run_set_id = %run_set_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "RUN_SET_OPERATION"
    );
}

/// Log structured data for run operations
pub fn log_run_operation(
    operation: &str,
    run_id: Uuid,
    run_set_id: Option<Uuid>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        run_id = %run_id,
        run_set_id = ?run_set_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "RUN_OPERATION"
    );
}

/// Log errors with structured context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
