//! # System Constants
//!
//! Names and defaults shared by configuration, logging and dispatch.

/// Prefix of every environment variable the crate reads.
pub const ENV_PREFIX: &str = "BATCHFLOW";

/// Environment variable selecting the runtime environment.
pub const ENV_ENVIRONMENT: &str = "BATCHFLOW_ENV";

/// Thread pool workers started per available CPU.
pub const DEFAULT_WORKERS_PER_CPU: usize = 4;

/// Base name of configuration files, e.g. `batchflow.toml`, `batchflow.test.toml`.
pub const CONFIG_FILE_STEM: &str = "batchflow";

/// Environment used when none is set.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Environment variable names read by [`crate::config::DispatchSettings::from_env`].
///
/// Each is `BATCHFLOW_` followed by the upper-cased settings field, matching
/// what [`crate::config::SettingsLoader`] reads.
pub mod env_vars {
    pub const TARGET: &str = "BATCHFLOW_DEFAULT_TARGET";
    pub const MAX_WORKERS: &str = "BATCHFLOW_MAX_WORKERS";
    pub const ITEM_TIMEOUT_MS: &str = "BATCHFLOW_ITEM_TIMEOUT_MS";
    pub const STRICT_AGGREGATION: &str = "BATCHFLOW_STRICT_AGGREGATION";
    pub const LOG_FORMAT: &str = "BATCHFLOW_LOG_FORMAT";
    pub const LOG_LEVEL: &str = "BATCHFLOW_LOG_LEVEL";
}
