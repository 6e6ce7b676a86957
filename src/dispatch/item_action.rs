//! Per-item actions: the opaque work a dispatcher runs once per [`WorkItem`].

use async_trait::async_trait;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use super::outcome::Outcome;
use super::plan::WorkItem;
use crate::error::{ItemError, ItemErrorKind};

/// Work performed for a single item.
///
/// The dispatcher treats it as opaque and long-running; it may suspend at any
/// `.await`. Returning `Err` fails only this item.
#[async_trait]
pub trait ItemAction: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn run(&self, item: WorkItem) -> Result<Self::Output, ItemError>;
}

/// Async closure adapter, see [`action_fn`].
pub struct FnAction<F>(F);

/// Use an async closure `Fn(WorkItem) -> impl Future<Output = Result<T, ItemError>>` as an action.
pub fn action_fn<F, Fut, T>(f: F) -> FnAction<F>
where
    F: Fn(WorkItem) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ItemError>> + Send + 'static,
    T: Send + 'static,
{
    FnAction(f)
}

#[async_trait]
impl<F, Fut, T> ItemAction for FnAction<F>
where
    F: Fn(WorkItem) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ItemError>> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    async fn run(&self, item: WorkItem) -> Result<T, ItemError> {
        (self.0)(item).await
    }
}

/// Blocking closure adapter, see [`blocking`].
pub struct BlockingAction<F>(Arc<F>);

/// Run a blocking closure on tokio's blocking thread pool for each item.
///
/// Use this for actions that block on file or network I/O so they never stall
/// the async workers driving sibling items.
pub fn blocking<F, T>(f: F) -> BlockingAction<F>
where
    F: Fn(WorkItem) -> Result<T, ItemError> + Send + Sync + 'static,
    T: Send + 'static,
{
    BlockingAction(Arc::new(f))
}

#[async_trait]
impl<F, T> ItemAction for BlockingAction<F>
where
    F: Fn(WorkItem) -> Result<T, ItemError> + Send + Sync + 'static,
    T: Send + 'static,
{
    type Output = T;

    async fn run(&self, item: WorkItem) -> Result<T, ItemError> {
        let f = Arc::clone(&self.0);
        match tokio::task::spawn_blocking(move || f(item)).await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                Err(ItemError::panicked(join_error.into_panic().as_ref()))
            }
            Err(join_error) => Err(ItemError::other(format!(
                "blocking task did not finish: {join_error}"
            ))),
        }
    }
}

/// Run one item, turning errors, panics and timeouts into a tagged [`Outcome`].
pub(crate) async fn run_item<A: ItemAction + ?Sized>(
    action: &A,
    item: WorkItem,
    timeout: Option<Duration>,
) -> Outcome<A::Output> {
    let position = item.position();
    let guarded = AssertUnwindSafe(action.run(item)).catch_unwind();

    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    position = position,
                    timeout_ms = limit.as_millis() as u64,
                    "Work item timed out"
                );
                return Outcome::Failure(ItemError::new(
                    ItemErrorKind::Timeout,
                    format!("item {position} exceeded {}ms", limit.as_millis()),
                ));
            }
        },
        None => guarded.await,
    };

    match result {
        Ok(Ok(value)) => Outcome::Success(value),
        Ok(Err(item_error)) => {
            warn!(position = position, error = %item_error, "Work item failed");
            Outcome::Failure(item_error)
        }
        Err(payload) => {
            let item_error = ItemError::panicked(payload.as_ref());
            error!(position = position, error = %item_error, "Work item panicked");
            Outcome::Failure(item_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::plan::{ActionSignature, CallContext, InitSpec, WorkPlan};
    use serde_json::json;

    fn item(value: i64) -> WorkItem {
        let init = InitSpec::fixed(vec![vec![json!(value)]]);
        let signature = ActionSignature::new("double", ["value"]);
        WorkPlan::resolve(Some(&init), &signature, &CallContext::new())
            .unwrap()
            .into_items()
            .remove(0)
    }

    #[tokio::test]
    async fn test_fn_action_success() {
        let action = action_fn(|item: WorkItem| async move {
            let value = item.arg(0).and_then(|v| v.as_i64()).unwrap_or_default();
            Ok::<_, ItemError>(value * 2)
        });
        let outcome = run_item(&action, item(21), None).await;
        assert_eq!(outcome, Outcome::Success(42));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let action = action_fn(|_item: WorkItem| async move {
            if true {
                panic!("corrupt archive");
            }
            Ok::<i64, ItemError>(0)
        });
        let outcome = run_item(&action, item(1), None).await;
        let failure = outcome.failure().cloned().unwrap();
        assert_eq!(failure.kind, ItemErrorKind::Panicked);
        assert_eq!(failure.message, "corrupt archive");
    }

    #[tokio::test]
    async fn test_timeout_becomes_failure() {
        let action = action_fn(|_item: WorkItem| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<i64, ItemError>(0)
        });
        let outcome = run_item(&action, item(1), Some(Duration::from_millis(10))).await;
        assert_eq!(outcome.failure().map(|e| e.kind), Some(ItemErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_blocking_action_runs_off_the_async_workers() {
        let action = blocking(|item: WorkItem| {
            std::thread::sleep(Duration::from_millis(5));
            Ok(item.position())
        });
        assert_eq!(run_item(&action, item(1), None).await, Outcome::Success(0));

        let failing = blocking(|_item: WorkItem| -> Result<(), ItemError> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into())
        });
        let outcome = run_item(&failing, item(1), None).await;
        assert_eq!(outcome.failure().map(|e| e.kind), Some(ItemErrorKind::Io));
    }
}
