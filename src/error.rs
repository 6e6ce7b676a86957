//! Error types for the batchflow dispatch framework.
//!
//! Each concern owns a focused error enum; [`BatchflowError`] is the umbrella
//! returned by the high-level action runner.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::dispatch::state::RoundState;

/// Failure to build a component schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Duplicate component '{field}' in schema '{schema}'")]
    DuplicateField { schema: String, field: String },
    #[error("Empty component name at slot {slot} in schema '{schema}'")]
    EmptyName { schema: String, slot: usize },
}

/// Failure to read or write a component of a [`crate::components::ComponentTuple`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    #[error("Unknown component '{field}' in schema '{schema}'")]
    UnknownField { schema: String, field: String },
    #[error("Position {position} is out of range for component '{field}' with {len} items")]
    PositionOutOfRange {
        field: String,
        position: usize,
        len: usize,
    },
    #[error("Component tuple has no data to write position {position} of '{field}' into")]
    NoData { field: String, position: usize },
    #[error("Expected {expected} for component '{field}'")]
    ValueShape { field: String, expected: &'static str },
    #[error("Got {found} positions for a schema with {expected} components")]
    PositionArity { expected: usize, found: usize },
    #[error("Got {found} containers for a schema with {expected} components")]
    DataArity { expected: usize, found: usize },
    #[error("Component '{field}' holds {found} items, the batch index has {expected}")]
    LengthMismatch {
        field: String,
        expected: usize,
        found: usize,
    },
}

/// Failure to expand an init specification into a work plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Action '{action}' declares no init source")]
    MissingInit { action: String },
    #[error(
        "Init entry {position} of action '{action}' has {found} arguments, expected {expected}"
    )]
    ArityMismatch {
        action: String,
        position: usize,
        expected: usize,
        found: usize,
    },
    #[error("Init producer for action '{action}' failed: {reason}")]
    Producer { action: String, reason: String },
    #[error("Unknown init producer '{name}'")]
    UnknownProducer { name: String },
}

/// Coarse classification of a per-item failure.
///
/// Two runs of the same plan under different targets compare failures by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorKind {
    Io,
    InvalidInput,
    Timeout,
    Panicked,
    Other,
}

impl fmt::Display for ItemErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "io"),
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::Timeout => write!(f, "timeout"),
            Self::Panicked => write!(f, "panicked"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// An error raised inside a single work item's action.
///
/// Captured and tagged by the dispatcher, never propagated to sibling items.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct ItemError {
    pub kind: ItemErrorKind,
    pub message: String,
}

impl ItemError {
    pub fn new(kind: ItemErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ItemErrorKind::Io, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ItemErrorKind::InvalidInput, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ItemErrorKind::Other, message)
    }

    pub(crate) fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(ItemErrorKind::Panicked, message)
    }
}

impl From<std::io::Error> for ItemError {
    fn from(error: std::io::Error) -> Self {
        ItemError::io(error.to_string())
    }
}

impl From<serde_json::Error> for ItemError {
    fn from(error: serde_json::Error) -> Self {
        ItemError::invalid_input(format!("JSON error: {error}"))
    }
}

impl From<anyhow::Error> for ItemError {
    fn from(error: anyhow::Error) -> Self {
        if let Some(io) = error.downcast_ref::<std::io::Error>() {
            return ItemError::io(io.to_string());
        }
        ItemError::other(format!("{error:#}"))
    }
}

impl From<ComponentError> for ItemError {
    fn from(error: ComponentError) -> Self {
        ItemError::invalid_input(error.to_string())
    }
}

/// Failure of the dispatch step itself, as opposed to a failure of one item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Dispatch cancelled after {completed} of {total} items completed")]
    Cancelled { completed: usize, total: usize },
    #[error("Outcome for position {position} recorded twice")]
    DuplicateOutcome { position: usize },
    #[error("Outcome for position {position} is outside a plan of {total} items")]
    UnknownPosition { position: usize, total: usize },
    #[error("Collection finished with {missing} of {total} outcomes missing")]
    Incomplete { missing: usize, total: usize },
    #[error("Failed to start dispatcher: {0}")]
    Setup(String),
}

/// One line of an aggregate failure report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub position: usize,
    pub failed: bool,
    pub detail: String,
}

impl fmt::Display for OutcomeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = if self.failed { "failure" } else { "success" };
        write!(f, "#{} {}: {}", self.position, tag, self.detail)
    }
}

/// Raised by an aggregator after inspecting the ordered outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("{failed} of {total} items failed: {}", format_reports(.outcomes))]
    ItemsFailed {
        failed: usize,
        total: usize,
        outcomes: Vec<OutcomeReport>,
    },
    #[error("Aggregation failed: {0}")]
    Custom(String),
    #[error("Unknown aggregator '{name}'")]
    UnknownAggregator { name: String },
}

impl AggregateError {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Positions of the failed items, empty for non item-failure errors.
    pub fn failed_positions(&self) -> Vec<usize> {
        match self {
            Self::ItemsFailed { outcomes, .. } => outcomes
                .iter()
                .filter(|report| report.failed)
                .map(|report| report.position)
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn format_reports(outcomes: &[OutcomeReport]) -> String {
    outcomes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Configuration loading and validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(error: config::ConfigError) -> Self {
        ConfigError::Load(error.to_string())
    }
}

/// Umbrella error for a full dispatch round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchflowError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("Component error: {0}")]
    Component(#[from] ComponentError),
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Aggregate error: {0}")]
    Aggregate(#[from] AggregateError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid round transition from {from} to {to}")]
    InvalidTransition { from: RoundState, to: RoundState },
}

pub type Result<T> = std::result::Result<T, BatchflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_failed_lists_every_outcome() {
        let error = AggregateError::ItemsFailed {
            failed: 1,
            total: 2,
            outcomes: vec![
                OutcomeReport {
                    position: 0,
                    failed: false,
                    detail: "\"/tmp/a\"".to_string(),
                },
                OutcomeReport {
                    position: 1,
                    failed: true,
                    detail: "io error: connection reset".to_string(),
                },
            ],
        };

        let message = error.to_string();
        assert!(message.starts_with("1 of 2 items failed"));
        assert!(message.contains("#0 success"));
        assert!(message.contains("#1 failure: io error: connection reset"));
        assert_eq!(error.failed_positions(), vec![1]);
    }

    #[test]
    fn test_anyhow_io_error_keeps_io_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing archive");
        let error: ItemError = anyhow::Error::from(io).into();
        assert_eq!(error.kind, ItemErrorKind::Io);

        let error: ItemError = anyhow::anyhow!("bad checksum").into();
        assert_eq!(error.kind, ItemErrorKind::Other);
        assert_eq!(error.message, "bad checksum");
    }

    #[test]
    fn test_panic_payload_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        let error = ItemError::panicked(payload.as_ref());
        assert_eq!(error.kind, ItemErrorKind::Panicked);
        assert_eq!(error.message, "boom");
    }
}
