#![allow(dead_code)]

pub mod strategies;

use batchflow_core::dispatch::{
    action_fn, ActionSignature, Aggregator, CallContext, ConcurrencyTarget, InitSpec, ItemAction,
    Outcomes, WorkItem,
};
use batchflow_core::error::{AggregateError, ItemError};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const ALL_TARGETS: [ConcurrencyTarget; 3] = [
    ConcurrencyTarget::Sequential,
    ConcurrencyTarget::ThreadPool,
    ConcurrencyTarget::Cooperative,
];

pub fn numbers_signature() -> ActionSignature {
    ActionSignature::new("square", ["n"])
}

/// `n` init entries carrying `0..n`.
pub fn numbers_init(n: usize) -> InitSpec {
    InitSpec::fixed((0..n).map(|i| vec![json!(i)]).collect())
}

pub fn number(item: &WorkItem) -> Result<i64, ItemError> {
    item.param("n")
        .and_then(|value| value.as_i64())
        .ok_or_else(|| ItemError::invalid_input("n must be an integer"))
}

/// Squares its input, failing every item whose value is listed in `failing`.
pub fn square_failing(failing: Vec<i64>) -> impl ItemAction<Output = i64> {
    let failing = Arc::new(failing);
    action_fn(move |item: WorkItem| {
        let failing = Arc::clone(&failing);
        async move {
            let n = number(&item)?;
            if failing.contains(&n) {
                return Err(ItemError::io(format!("item {n} failed")));
            }
            tokio::task::yield_now().await;
            Ok(n * n)
        }
    })
}

/// Aggregator counting its invocations and returning the successful values.
#[derive(Clone, Default)]
pub struct CountingAggregator {
    pub calls: Arc<AtomicUsize>,
}

impl CountingAggregator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T: Clone + Send + Sync> Aggregator<T> for CountingAggregator {
    type Output = Vec<T>;

    fn aggregate(&self, outcomes: Outcomes<T>, _ctx: &CallContext) -> Result<Vec<T>, AggregateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(outcomes.iter().filter_map(|o| o.success().cloned()).collect())
    }
}
