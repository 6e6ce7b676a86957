//! # Aggregation
//!
//! The post step of a parallel action. It runs once per round with the ordered
//! outcomes and the original call context, and either combines the successful
//! values into the action's result or raises an [`AggregateError`].
//!
//! A bare aggregator sees failures as ordinary outcomes. [`Strict`] checks
//! [`Outcomes::any_failed`] first and raises [`AggregateError::ItemsFailed`]
//! listing every outcome, which is what actions get unless they opt out.

use std::fmt;
use std::sync::Arc;
use tracing::warn;

use super::outcome::Outcomes;
use super::plan::CallContext;
use crate::error::AggregateError;

/// Combines the ordered outcomes of a round.
pub trait Aggregator<T>: Send + Sync {
    type Output;

    fn aggregate(
        &self,
        outcomes: Outcomes<T>,
        ctx: &CallContext,
    ) -> Result<Self::Output, AggregateError>;
}

impl<T, A> Aggregator<T> for Arc<A>
where
    A: Aggregator<T> + ?Sized,
{
    type Output = A::Output;

    fn aggregate(
        &self,
        outcomes: Outcomes<T>,
        ctx: &CallContext,
    ) -> Result<Self::Output, AggregateError> {
        (**self).aggregate(outcomes, ctx)
    }
}

/// Closure adapter, see [`aggregator_fn`].
pub struct FnAggregator<F>(F);

/// Use `Fn(Outcomes<T>, &CallContext) -> Result<R, AggregateError>` as an aggregator.
pub fn aggregator_fn<F, T, R>(f: F) -> FnAggregator<F>
where
    F: Fn(Outcomes<T>, &CallContext) -> Result<R, AggregateError> + Send + Sync,
{
    FnAggregator(f)
}

impl<F, T, R> Aggregator<T> for FnAggregator<F>
where
    F: Fn(Outcomes<T>, &CallContext) -> Result<R, AggregateError> + Send + Sync,
{
    type Output = R;

    fn aggregate(&self, outcomes: Outcomes<T>, ctx: &CallContext) -> Result<R, AggregateError> {
        (self.0)(outcomes, ctx)
    }
}

/// Raise [`AggregateError::ItemsFailed`] when any outcome failed.
pub fn ensure_no_failures<T: fmt::Debug>(outcomes: &Outcomes<T>) -> Result<(), AggregateError> {
    if !outcomes.any_failed() {
        return Ok(());
    }

    let failed = outcomes.failed_count();
    warn!(
        failed = failed,
        total = outcomes.len(),
        "Refusing to aggregate a round with failed items"
    );
    Err(AggregateError::ItemsFailed {
        failed,
        total: outcomes.len(),
        outcomes: outcomes.report(),
    })
}

/// Wraps an aggregator so it only ever sees rounds without failures.
#[derive(Debug, Clone)]
pub struct Strict<A>(A);

impl<A> Strict<A> {
    pub fn new(inner: A) -> Self {
        Self(inner)
    }

    pub fn into_inner(self) -> A {
        self.0
    }
}

impl<T, A> Aggregator<T> for Strict<A>
where
    T: fmt::Debug,
    A: Aggregator<T>,
{
    type Output = A::Output;

    fn aggregate(
        &self,
        outcomes: Outcomes<T>,
        ctx: &CallContext,
    ) -> Result<Self::Output, AggregateError> {
        ensure_no_failures(&outcomes)?;
        self.0.aggregate(outcomes, ctx)
    }
}

/// Collects successful values in position order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectSuccesses;

impl<T> Aggregator<T> for CollectSuccesses {
    type Output = Vec<T>;

    fn aggregate(
        &self,
        outcomes: Outcomes<T>,
        _ctx: &CallContext,
    ) -> Result<Vec<T>, AggregateError> {
        outcomes
            .into_successes()
            .map_err(|e| AggregateError::custom(format!("cannot collect a failed item: {e}")))
    }
}

/// Concatenates per-item sequences in position order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Concat;

impl<T> Aggregator<Vec<T>> for Concat {
    type Output = Vec<T>;

    fn aggregate(
        &self,
        outcomes: Outcomes<Vec<T>>,
        _ctx: &CallContext,
    ) -> Result<Vec<T>, AggregateError> {
        let parts = outcomes
            .into_successes()
            .map_err(|e| AggregateError::custom(format!("cannot concatenate a failed item: {e}")))?;
        Ok(parts.into_iter().flatten().collect())
    }
}
