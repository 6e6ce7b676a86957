//! Configuration Loader
//!
//! Environment-aware loading of [`DispatchSettings`]: an optional base file, an
//! optional per-environment overlay and `BATCHFLOW_*` environment variables,
//! merged in that order through the `config` crate.

use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::DispatchSettings;
use crate::constants::{CONFIG_FILE_STEM, DEFAULT_ENVIRONMENT, ENV_ENVIRONMENT, ENV_PREFIX};
use crate::error::ConfigError;

/// Builder for layered settings loading.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    directory: Option<PathBuf>,
    file: Option<PathBuf>,
    environment: String,
    env_prefix: String,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self {
            directory: None,
            file: None,
            environment: detect_environment(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Look for `batchflow.toml` and `batchflow.<env>.toml` in `directory`.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Load this file, which must exist, instead of searching a directory.
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Use an explicit environment instead of `BATCHFLOW_ENV`.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into().to_lowercase();
        self
    }

    /// Read overrides from `<PREFIX>_*` variables instead of `BATCHFLOW_*`.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn load(&self) -> Result<DispatchSettings, ConfigError> {
        let mut builder = Config::builder();

        if let Some(directory) = &self.directory {
            builder = builder
                .add_source(File::from(base_file(directory)).required(false))
                .add_source(File::from(environment_file(directory, &self.environment)).required(false));
        }

        if let Some(file) = &self.file {
            builder = builder.add_source(File::from(file.as_path()).required(true));
        }

        builder = builder.add_source(Environment::with_prefix(&self.env_prefix).try_parsing(true));

        let settings: DispatchSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;

        debug!(
            environment = %self.environment,
            default_target = %settings.default_target,
            max_workers = settings.max_workers,
            strict_aggregation = settings.strict_aggregation,
            "Dispatch settings loaded"
        );

        Ok(settings)
    }
}

/// Current environment from `BATCHFLOW_ENV`, `APP_ENV` or the development default.
pub fn detect_environment() -> String {
    env::var(ENV_ENVIRONMENT)
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string())
        .to_lowercase()
}

fn base_file(directory: &Path) -> PathBuf {
    directory.join(format!("{CONFIG_FILE_STEM}.toml"))
}

fn environment_file(directory: &Path, environment: &str) -> PathBuf {
    directory.join(format!("{CONFIG_FILE_STEM}.{environment}.toml"))
}
