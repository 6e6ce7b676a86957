use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ensure_not_cancelled, ConcurrencyTarget, Dispatcher};
use crate::dispatch::item_action::{run_item, ItemAction};
use crate::dispatch::outcome::{OutcomeCollector, Outcomes};
use crate::dispatch::plan::WorkPlan;
use crate::error::DispatchError;

/// Runs items as tokio tasks, at most `max_workers` at a time.
///
/// On a multi-thread runtime the tasks spread over its OS worker threads.
/// Blocking actions should be wrapped with
/// [`blocking`](crate::dispatch::item_action::blocking) so they run on the
/// blocking pool instead. Writes from sibling items to the same component
/// position are not coordinated.
#[derive(Debug, Clone)]
pub struct ThreadPoolDispatcher {
    max_workers: usize,
    item_timeout: Option<Duration>,
}

impl ThreadPoolDispatcher {
    pub fn new(max_workers: usize, item_timeout: Option<Duration>) -> Self {
        Self {
            max_workers: max_workers.max(1),
            item_timeout,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }
}

#[async_trait]
impl Dispatcher for ThreadPoolDispatcher {
    fn target(&self) -> ConcurrencyTarget {
        ConcurrencyTarget::ThreadPool
    }

    async fn dispatch<A: ItemAction>(
        &self,
        plan: WorkPlan,
        action: Arc<A>,
        cancel: &CancellationToken,
    ) -> Result<Outcomes<A::Output>, DispatchError> {
        let runtime = Handle::try_current()
            .map_err(|e| DispatchError::Setup(format!("no tokio runtime available: {e}")))?;

        let total = plan.len();
        ensure_not_cancelled(cancel, total)?;
        let mut collector = OutcomeCollector::new(total);
        let permits = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();

        debug!(
            items = total,
            max_workers = self.max_workers,
            "Spawning thread pool items"
        );

        for item in plan.into_items() {
            let position = item.position();
            let action = Arc::clone(&action);
            let permits = Arc::clone(&permits);
            let timeout = self.item_timeout;

            tasks.spawn_on(
                async move {
                    // The semaphore is never closed, so the permit is always granted.
                    let _permit = permits.acquire_owned().await.ok();
                    (position, run_item(action.as_ref(), item, timeout).await)
                },
                &runtime,
            );
        }

        loop {
            // Finished items are drained before a pending cancellation is observed
            tokio::select! {
                biased;
                joined = tasks.join_next() => match joined {
                    Some(Ok((position, outcome))) => collector.record(position, outcome)?,
                    Some(Err(join_error)) => {
                        return Err(DispatchError::Setup(format!(
                            "worker task ended without an outcome: {join_error}"
                        )));
                    }
                    None => break,
                },
                _ = cancel.cancelled() => {
                    let completed = collector.completed();
                    tasks.abort_all();
                    warn!(completed = completed, total = total, "Thread pool dispatch cancelled");
                    return Err(DispatchError::Cancelled { completed, total });
                }
            }
        }

        collector.finish()
    }
}
