use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ensure_not_cancelled, ConcurrencyTarget, Dispatcher};
use crate::dispatch::item_action::{run_item, ItemAction};
use crate::dispatch::outcome::{OutcomeCollector, Outcomes};
use crate::dispatch::plan::WorkPlan;
use crate::error::DispatchError;

/// Runs items one after another in plan order, never overlapping.
#[derive(Debug, Clone, Default)]
pub struct SequentialDispatcher {
    item_timeout: Option<Duration>,
}

impl SequentialDispatcher {
    pub fn new(item_timeout: Option<Duration>) -> Self {
        Self { item_timeout }
    }
}

#[async_trait]
impl Dispatcher for SequentialDispatcher {
    fn target(&self) -> ConcurrencyTarget {
        ConcurrencyTarget::Sequential
    }

    async fn dispatch<A: ItemAction>(
        &self,
        plan: WorkPlan,
        action: Arc<A>,
        cancel: &CancellationToken,
    ) -> Result<Outcomes<A::Output>, DispatchError> {
        let total = plan.len();
        ensure_not_cancelled(cancel, total)?;
        let mut collector = OutcomeCollector::new(total);

        for item in plan.into_items() {
            let position = item.position();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(DispatchError::Cancelled {
                        completed: collector.completed(),
                        total,
                    });
                }
                outcome = run_item(action.as_ref(), item, self.item_timeout) => outcome,
            };
            debug!(
                position = position,
                success = outcome.is_success(),
                "Sequential item resolved"
            );
            collector.record(position, outcome)?;
        }

        collector.finish()
    }
}
