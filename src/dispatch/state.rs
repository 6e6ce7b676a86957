//! Dispatch round lifecycle.
//!
//! `plan -> dispatch -> collect -> aggregate -> done`, with `failed` reachable
//! from plan, dispatch and aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::error::BatchflowError;

/// State of one dispatch round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    /// Expanding the init specification
    Plan,
    /// Items are running
    Dispatch,
    /// Every item resolved, outcomes are being ordered
    Collect,
    /// Post step is running
    Aggregate,
    /// Round produced a result
    Done,
    /// Round ended with an error
    Failed,
}

impl RoundState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn can_transition_to(&self, next: RoundState) -> bool {
        matches!(
            (self, next),
            (Self::Plan, Self::Dispatch)
                | (Self::Dispatch, Self::Collect)
                | (Self::Collect, Self::Aggregate)
                | (Self::Aggregate, Self::Done)
                | (Self::Plan, Self::Failed)
                | (Self::Dispatch, Self::Failed)
                | (Self::Aggregate, Self::Failed)
        )
    }
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plan => write!(f, "plan"),
            Self::Dispatch => write!(f, "dispatch"),
            Self::Collect => write!(f, "collect"),
            Self::Aggregate => write!(f, "aggregate"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RoundState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plan" => Ok(Self::Plan),
            "dispatch" => Ok(Self::Dispatch),
            "collect" => Ok(Self::Collect),
            "aggregate" => Ok(Self::Aggregate),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid round state: {s}")),
        }
    }
}

/// A recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTransition {
    pub from: RoundState,
    pub to: RoundState,
    pub at: DateTime<Utc>,
}

/// Tracks the state of a single round and its history.
#[derive(Debug, Clone)]
pub struct RoundTracker {
    round_id: Uuid,
    action: String,
    state: RoundState,
    started_at: DateTime<Utc>,
    history: Vec<RoundTransition>,
}

impl RoundTracker {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            round_id: Uuid::new_v4(),
            action: action.into(),
            state: RoundState::Plan,
            started_at: Utc::now(),
            history: Vec::new(),
        }
    }

    pub fn round_id(&self) -> Uuid {
        self.round_id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn history(&self) -> &[RoundTransition] {
        &self.history
    }

    pub fn transition(&mut self, to: RoundState) -> Result<(), BatchflowError> {
        if !self.state.can_transition_to(to) {
            return Err(BatchflowError::InvalidTransition {
                from: self.state,
                to,
            });
        }

        debug!(
            round_id = %self.round_id,
            action = %self.action,
            from = %self.state,
            to = %to,
            "Round transition"
        );
        self.history.push(RoundTransition {
            from: self.state,
            to,
            at: Utc::now(),
        });
        self.state = to;
        Ok(())
    }
}
