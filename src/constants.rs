//! # System Constants
//!
//! Names and limits shared across modules.

/// Process environment detection and file naming
pub mod environment {
    /// Primary environment variable naming the deployment environment
    pub const ENV_VAR: &str = "CBAS_ENV";

    /// Fallback environment variable
    pub const FALLBACK_ENV_VAR: &str = "APP_ENV";

    pub const DEFAULT_ENVIRONMENT: &str = "development";

    /// Directory structured log files are written to
    pub const LOG_DIRECTORY: &str = "log";

    /// Resolve the current environment name.
    pub fn detect() -> String {
        std::env::var(ENV_VAR)
            .or_else(|_| std::env::var(FALLBACK_ENV_VAR))
            .unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string())
    }
}

pub mod system {
    pub const CBAS_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// User agent sent by the HTTP clients
    pub const USER_AGENT: &str = concat!("cbas-core-rs/", env!("CARGO_PKG_VERSION"));
}
