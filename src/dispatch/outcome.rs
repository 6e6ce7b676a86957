//! Per-item outcomes and their ordered collection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

use crate::error::{DispatchError, ItemError, OutcomeReport};

/// Result of running one work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome<T> {
    Success(T),
    Failure(ItemError),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ItemError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, ItemError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(error) => Err(error),
        }
    }
}

impl<T> From<Result<T, ItemError>> for Outcome<T> {
    fn from(result: Result<T, ItemError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::Failure(error),
        }
    }
}

/// True iff at least one outcome is a failure; false for an empty list.
pub fn any_failed<T>(outcomes: &[Outcome<T>]) -> bool {
    outcomes.iter().any(Outcome::is_failure)
}

/// Complete outcome list of a round, in work item position order.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcomes<T> {
    items: Vec<Outcome<T>>,
}

impl<T> Outcomes<T> {
    pub fn any_failed(&self) -> bool {
        any_failed(&self.items)
    }

    pub fn failed_count(&self) -> usize {
        self.items.iter().filter(|o| o.is_failure()).count()
    }

    /// Failed positions with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &ItemError)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(position, outcome)| outcome.failure().map(|e| (position, e)))
    }

    /// Successful values in order, or the first failure.
    pub fn into_successes(self) -> Result<Vec<T>, ItemError> {
        self.items.into_iter().map(Outcome::into_result).collect()
    }

    pub fn into_vec(self) -> Vec<Outcome<T>> {
        self.items
    }
}

impl<T: fmt::Debug> Outcomes<T> {
    /// One report line per outcome, successes included.
    pub fn report(&self) -> Vec<OutcomeReport> {
        self.items
            .iter()
            .enumerate()
            .map(|(position, outcome)| match outcome {
                Outcome::Success(value) => OutcomeReport {
                    position,
                    failed: false,
                    detail: format!("{value:?}"),
                },
                Outcome::Failure(error) => OutcomeReport {
                    position,
                    failed: true,
                    detail: error.to_string(),
                },
            })
            .collect()
    }
}

impl<T> Deref for Outcomes<T> {
    type Target = [Outcome<T>];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<T> From<Vec<Outcome<T>>> for Outcomes<T> {
    fn from(items: Vec<Outcome<T>>) -> Self {
        Self { items }
    }
}

impl<T> IntoIterator for Outcomes<T> {
    type Item = Outcome<T>;
    type IntoIter = std::vec::IntoIter<Outcome<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Gathers outcomes in completion order and releases them in position order.
#[derive(Debug)]
pub struct OutcomeCollector<T> {
    slots: Vec<Option<Outcome<T>>>,
    completed: usize,
}

impl<T> OutcomeCollector<T> {
    pub fn new(total: usize) -> Self {
        Self {
            slots: (0..total).map(|_| None).collect(),
            completed: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.slots.len()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.slots.len()
    }

    /// Store the outcome of the item at `position`; each position is recorded once.
    pub fn record(&mut self, position: usize, outcome: Outcome<T>) -> Result<(), DispatchError> {
        let total = self.slots.len();
        let slot = self
            .slots
            .get_mut(position)
            .ok_or(DispatchError::UnknownPosition { position, total })?;

        if slot.is_some() {
            return Err(DispatchError::DuplicateOutcome { position });
        }
        *slot = Some(outcome);
        self.completed += 1;
        Ok(())
    }

    /// Ordered outcomes once every position has been recorded.
    pub fn finish(self) -> Result<Outcomes<T>, DispatchError> {
        let total = self.slots.len();
        if !self.is_complete() {
            return Err(DispatchError::Incomplete {
                missing: total - self.completed,
                total,
            });
        }

        let items = self.slots.into_iter().flatten().collect();
        Ok(Outcomes { items })
    }
}
