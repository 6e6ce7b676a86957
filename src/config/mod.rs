//! # Dispatch Configuration
//!
//! Defaults applied to parallel actions that do not set their own target,
//! worker bound, timeout or failure policy, plus logging preferences.
//!
//! Settings come from, in increasing priority: built-in defaults, the
//! `batchflow.toml` file, the environment specific `batchflow.<env>.toml` file
//! and `BATCHFLOW_*` environment variables.
//!
//! ```rust,no_run
//! use batchflow_core::config::SettingsLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = SettingsLoader::new().with_directory("config").load()?;
//! println!("default target: {}", settings.default_target);
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use loader::SettingsLoader;

use crate::constants::env_vars;
use crate::dispatch::{ConcurrencyTarget, DispatchOptions};
use crate::error::ConfigError;

/// Output format of the structured logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid log format: {s}")),
        }
    }
}

/// Process-wide dispatch defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Target used by actions built with [`crate::dispatch::ParallelAction::with_settings`]
    pub default_target: ConcurrencyTarget,
    /// Items in flight per round; unset means a few workers per CPU
    pub max_workers: Option<usize>,
    /// Per-item time limit in milliseconds
    pub item_timeout_ms: Option<u64>,
    /// Raise automatically when any item failed
    pub strict_aggregation: bool,
    pub log_format: LogFormat,
    /// `EnvFilter` directive overriding the environment default
    pub log_level: Option<String>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            default_target: ConcurrencyTarget::ThreadPool,
            max_workers: None,
            item_timeout_ms: None,
            strict_aggregation: true,
            log_format: LogFormat::Pretty,
            log_level: None,
        }
    }
}

impl DispatchSettings {
    /// Defaults overridden by `BATCHFLOW_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Ok(target) = std::env::var(env_vars::TARGET) {
            settings.default_target = target.parse().map_err(|reason| ConfigError::InvalidValue {
                field: "default_target".to_string(),
                reason,
            })?;
        }

        if let Ok(max_workers) = std::env::var(env_vars::MAX_WORKERS) {
            settings.max_workers = Some(max_workers.parse().map_err(|e| {
                ConfigError::InvalidValue {
                    field: "max_workers".to_string(),
                    reason: format!("{e}"),
                }
            })?);
        }

        if let Ok(timeout) = std::env::var(env_vars::ITEM_TIMEOUT_MS) {
            settings.item_timeout_ms = Some(timeout.parse().map_err(|e| {
                ConfigError::InvalidValue {
                    field: "item_timeout_ms".to_string(),
                    reason: format!("{e}"),
                }
            })?);
        }

        if let Ok(strict) = std::env::var(env_vars::STRICT_AGGREGATION) {
            settings.strict_aggregation = strict.parse().map_err(|e| ConfigError::InvalidValue {
                field: "strict_aggregation".to_string(),
                reason: format!("{e}"),
            })?;
        }

        if let Ok(format) = std::env::var(env_vars::LOG_FORMAT) {
            settings.log_format = format.parse().map_err(|reason| ConfigError::InvalidValue {
                field: "log_format".to_string(),
                reason,
            })?;
        }

        if let Ok(level) = std::env::var(env_vars::LOG_LEVEL) {
            settings.log_level = Some(level);
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Settings from one file, overridden by `BATCHFLOW_*` variables.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        SettingsLoader::new()
            .with_file(path.as_ref().to_path_buf())
            .load()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_workers".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.item_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "item_timeout_ms".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_ms.map(Duration::from_millis)
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            max_workers: self.max_workers,
            item_timeout: self.item_timeout(),
        }
    }
}
