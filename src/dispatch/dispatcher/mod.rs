//! # Dispatchers
//!
//! Strategies that run every item of a [`WorkPlan`] exactly once and hand back
//! one [`Outcome`](super::outcome::Outcome) per item in position order.
//!
//! The target only changes scheduling. Running the same plan sequentially, on
//! the thread pool or cooperatively yields equal successes and failures of the
//! same kind, in the same order.
//!
//! | Target        | Scheduling                                              |
//! |---------------|---------------------------------------------------------|
//! | `sequential`  | one item at a time, in plan order                       |
//! | `thread-pool` | tokio tasks on the multi-thread runtime, bounded        |
//! | `cooperative` | one task polling every item future, bounded             |

mod cooperative;
mod sequential;
mod thread_pool;

pub use cooperative::CooperativeDispatcher;
pub use sequential::SequentialDispatcher;
pub use thread_pool::ThreadPoolDispatcher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::item_action::ItemAction;
use super::outcome::Outcomes;
use super::plan::WorkPlan;
use crate::constants::DEFAULT_WORKERS_PER_CPU;
use crate::error::DispatchError;

/// Scheduling strategy of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum ConcurrencyTarget {
    Sequential,
    #[default]
    ThreadPool,
    Cooperative,
}

impl ConcurrencyTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::ThreadPool => "thread-pool",
            Self::Cooperative => "cooperative",
        }
    }
}

impl fmt::Display for ConcurrencyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConcurrencyTarget {
    type Err = String;

    /// Accepts the canonical names and the short pipeline spellings
    /// (`f`/`for`, `t`/`threads`, `a`/`async`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "for" | "f" => Ok(Self::Sequential),
            "thread-pool" | "thread_pool" | "threads" | "t" => Ok(Self::ThreadPool),
            "cooperative" | "async" | "a" => Ok(Self::Cooperative),
            other => Err(format!("Invalid concurrency target: {other}")),
        }
    }
}

impl TryFrom<String> for ConcurrencyTarget {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Tuning shared by every dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Upper bound on items in flight; `None` picks a per-target default.
    pub max_workers: Option<usize>,
    /// Items running longer than this fail with a timeout.
    pub item_timeout: Option<Duration>,
}

impl DispatchOptions {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = Some(timeout);
        self
    }
}

/// Default thread pool size: a few workers per CPU since items mostly wait on I/O.
pub fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * DEFAULT_WORKERS_PER_CPU
}

/// Runs a work plan and delivers ordered outcomes.
///
/// Implementations isolate failures per item: an item that errors, panics or
/// times out becomes a failure outcome and never stops its siblings. When
/// `cancel` fires before every item resolved, outstanding items are abandoned
/// and [`DispatchError::Cancelled`] is returned. A token that is already
/// cancelled fails the dispatch even for an empty plan, and items that have
/// already resolved are collected before cancellation is reported.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    fn target(&self) -> ConcurrencyTarget;

    async fn dispatch<A: ItemAction>(
        &self,
        plan: WorkPlan,
        action: Arc<A>,
        cancel: &CancellationToken,
    ) -> Result<Outcomes<A::Output>, DispatchError>;
}

/// Fails with [`DispatchError::Cancelled`] when `cancel` fired before dispatch began.
pub(crate) fn ensure_not_cancelled(
    cancel: &CancellationToken,
    total: usize,
) -> Result<(), DispatchError> {
    if cancel.is_cancelled() {
        return Err(DispatchError::Cancelled {
            completed: 0,
            total,
        });
    }
    Ok(())
}

/// Dispatcher selected at run time from a [`ConcurrencyTarget`].
#[derive(Debug, Clone)]
pub enum TargetDispatcher {
    Sequential(SequentialDispatcher),
    ThreadPool(ThreadPoolDispatcher),
    Cooperative(CooperativeDispatcher),
}

impl TargetDispatcher {
    pub fn for_target(target: ConcurrencyTarget, options: &DispatchOptions) -> Self {
        match target {
            ConcurrencyTarget::Sequential => {
                Self::Sequential(SequentialDispatcher::new(options.item_timeout))
            }
            ConcurrencyTarget::ThreadPool => Self::ThreadPool(ThreadPoolDispatcher::new(
                options.max_workers.unwrap_or_else(default_max_workers),
                options.item_timeout,
            )),
            ConcurrencyTarget::Cooperative => Self::Cooperative(CooperativeDispatcher::new(
                options.max_workers,
                options.item_timeout,
            )),
        }
    }
}

#[async_trait]
impl Dispatcher for TargetDispatcher {
    fn target(&self) -> ConcurrencyTarget {
        match self {
            Self::Sequential(d) => d.target(),
            Self::ThreadPool(d) => d.target(),
            Self::Cooperative(d) => d.target(),
        }
    }

    async fn dispatch<A: ItemAction>(
        &self,
        plan: WorkPlan,
        action: Arc<A>,
        cancel: &CancellationToken,
    ) -> Result<Outcomes<A::Output>, DispatchError> {
        match self {
            Self::Sequential(d) => d.dispatch(plan, action, cancel).await,
            Self::ThreadPool(d) => d.dispatch(plan, action, cancel).await,
            Self::Cooperative(d) => d.dispatch(plan, action, cancel).await,
        }
    }
}
