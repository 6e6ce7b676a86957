//! # Structured Logging Module
//!
//! Environment-aware structured logging for dispatch rounds. Pretty console
//! output by default, JSON lines when configured.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::loader::detect_environment;
use crate::config::{DispatchSettings, LogFormat};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging from `BATCHFLOW_*` environment variables.
///
/// Falls back to default settings when the environment holds invalid values.
pub fn init_structured_logging() {
    let settings = DispatchSettings::from_env().unwrap_or_default();
    init_with_settings(&settings);
}

/// Initialize structured logging with explicit settings. Only the first call
/// in a process has any effect.
pub fn init_with_settings(settings: &DispatchSettings) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = detect_environment();
        let log_level = settings
            .log_level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment).to_string());

        let layer = match settings.log_format {
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(EnvFilter::new(&log_level))
                .boxed(),
            LogFormat::Json => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(EnvFilter::new(&log_level))
                .boxed(),
        };

        // Another subscriber may already be installed by the host application
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            format = %settings.log_format,
            level = %log_level,
            "Structured logging initialized"
        );
    });
}

/// Get log level based on environment
pub fn get_log_level(environment: &str) -> &'static str {
    match environment.to_ascii_lowercase().as_str() {
        "test" => "debug",
        "development" => "debug",
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for a dispatch round milestone
pub fn log_round_operation(
    operation: &str,
    action: &str,
    target: &str,
    items: Option<usize>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        action = %action,
        target = %target,
        items = items,
        status = %status,
        details = details,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "ROUND_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "ERROR"
    );
}
