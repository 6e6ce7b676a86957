use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ensure_not_cancelled, ConcurrencyTarget, Dispatcher};
use crate::dispatch::item_action::{run_item, ItemAction};
use crate::dispatch::outcome::{OutcomeCollector, Outcomes};
use crate::dispatch::plan::WorkPlan;
use crate::error::DispatchError;

/// Polls every item future from the calling task.
///
/// Items interleave only at their own `.await` points, so a component write
/// inside an action is never observed half done by a sibling.
#[derive(Debug, Clone, Default)]
pub struct CooperativeDispatcher {
    max_in_flight: Option<usize>,
    item_timeout: Option<Duration>,
}

impl CooperativeDispatcher {
    /// `max_in_flight` of `None` starts every item at once.
    pub fn new(max_in_flight: Option<usize>, item_timeout: Option<Duration>) -> Self {
        Self {
            max_in_flight,
            item_timeout,
        }
    }
}

#[async_trait]
impl Dispatcher for CooperativeDispatcher {
    fn target(&self) -> ConcurrencyTarget {
        ConcurrencyTarget::Cooperative
    }

    async fn dispatch<A: ItemAction>(
        &self,
        plan: WorkPlan,
        action: Arc<A>,
        cancel: &CancellationToken,
    ) -> Result<Outcomes<A::Output>, DispatchError> {
        let total = plan.len();
        ensure_not_cancelled(cancel, total)?;
        let limit = self.max_in_flight.unwrap_or(total).max(1);
        let timeout = self.item_timeout;
        let mut collector = OutcomeCollector::new(total);

        debug!(items = total, max_in_flight = limit, "Polling cooperative items");

        let mut pending = stream::iter(plan.into_items())
            .map(|item| {
                let action = Arc::clone(&action);
                async move {
                    let position = item.position();
                    (position, run_item(action.as_ref(), item, timeout).await)
                }
            })
            .buffer_unordered(limit);

        loop {
            tokio::select! {
                biased;
                next = pending.next() => match next {
                    Some((position, outcome)) => collector.record(position, outcome)?,
                    None => break,
                },
                _ = cancel.cancelled() => {
                    let completed = collector.completed();
                    warn!(completed = completed, total = total, "Cooperative dispatch cancelled");
                    return Err(DispatchError::Cancelled { completed, total });
                }
            }
        }

        collector.finish()
    }
}
