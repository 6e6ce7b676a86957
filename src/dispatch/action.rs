//! # Parallel Actions
//!
//! A [`ParallelAction`] ties together the three declarations of a pipeline
//! action: where its work items come from (`init`), how they are scheduled
//! (`target`) and how the ordered outcomes are combined (`post`).
//!
//! ```rust,no_run
//! use batchflow_core::dispatch::{
//!     action_fn, ActionSignature, CallContext, Concat, ConcurrencyTarget, InitSpec,
//!     ParallelAction, WorkItem,
//! };
//! use batchflow_core::error::ItemError;
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> batchflow_core::Result<()> {
//! let download = ParallelAction::new(
//!     ActionSignature::new("download", ["url"]),
//!     action_fn(|item: WorkItem| async move {
//!         let url = item.param_str("url")?.to_string();
//!         Ok::<_, ItemError>(vec![format!("/tmp/{}", url.rsplit('/').next().unwrap_or(""))])
//!     }),
//!     Concat,
//! )
//! .init(InitSpec::fixed(vec![vec![json!("http://a/x.zip")], vec![json!("http://a/y.zip")]]))
//! .target(ConcurrencyTarget::ThreadPool);
//!
//! let paths = download.run(CallContext::new(), &CancellationToken::new()).await?;
//! assert_eq!(paths, vec!["/tmp/x.zip", "/tmp/y.zip"]);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::field::{display, Empty};
use tracing::{info, instrument, Span};

use super::aggregate::{Aggregator, Strict};
use super::dispatcher::{ConcurrencyTarget, DispatchOptions, Dispatcher, TargetDispatcher};
use super::item_action::ItemAction;
use super::plan::{ActionSignature, CallContext, InitSpec, WorkPlan};
use super::state::{RoundState, RoundTracker};
use crate::config::DispatchSettings;
use crate::error::{BatchflowError, Result};
use crate::logging::{log_error, log_round_operation};

/// What the post step sees when items failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any failed item raises an aggregate error before the aggregator runs.
    #[default]
    Strict,
    /// The aggregator receives failures and decides itself.
    AllowFailures,
}

/// Shared handle to a type-erased aggregator.
pub type AggregatorRef<T, R> = Arc<dyn Aggregator<T, Output = R>>;

/// A declared parallel action, runnable any number of times.
pub struct ParallelAction<A: ItemAction, R> {
    signature: ActionSignature,
    init: Option<InitSpec>,
    action: Arc<A>,
    post: AggregatorRef<A::Output, R>,
    target: ConcurrencyTarget,
    options: DispatchOptions,
    failure_policy: FailurePolicy,
}

impl<A: ItemAction, R> fmt::Debug for ParallelAction<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelAction")
            .field("signature", &self.signature)
            .field("init", &self.init)
            .field("target", &self.target)
            .field("options", &self.options)
            .field("failure_policy", &self.failure_policy)
            .finish_non_exhaustive()
    }
}

impl<A, R> ParallelAction<A, R>
where
    A: ItemAction,
    A::Output: fmt::Debug,
{
    pub fn new<P>(signature: ActionSignature, action: A, post: P) -> Self
    where
        P: Aggregator<A::Output, Output = R> + 'static,
    {
        Self::from_parts(signature, Arc::new(action), Arc::new(post))
    }

    pub fn from_parts(
        signature: ActionSignature,
        action: Arc<A>,
        post: AggregatorRef<A::Output, R>,
    ) -> Self {
        Self {
            signature,
            init: None,
            action,
            post,
            target: ConcurrencyTarget::default(),
            options: DispatchOptions::default(),
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn init(mut self, init: InitSpec) -> Self {
        self.init = Some(init);
        self
    }

    pub fn target(mut self, target: ConcurrencyTarget) -> Self {
        self.target = target;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.options.max_workers = Some(max_workers);
        self
    }

    pub fn item_timeout(mut self, timeout: Duration) -> Self {
        self.options.item_timeout = Some(timeout);
        self
    }

    /// Hand failed items to the aggregator instead of raising automatically.
    pub fn allow_failures(mut self) -> Self {
        self.failure_policy = FailurePolicy::AllowFailures;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Apply configured defaults: target, worker bound, timeout and policy.
    pub fn with_settings(mut self, settings: &DispatchSettings) -> Self {
        self.target = settings.default_target;
        self.options = settings.dispatch_options();
        self.failure_policy = if settings.strict_aggregation {
            FailurePolicy::Strict
        } else {
            FailurePolicy::AllowFailures
        };
        self
    }

    pub fn signature(&self) -> &ActionSignature {
        &self.signature
    }

    pub fn current_target(&self) -> ConcurrencyTarget {
        self.target
    }

    pub fn current_failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Run one round: plan, dispatch, collect, aggregate.
    ///
    /// Cancellation before every item resolved fails the round without running
    /// the aggregator.
    #[instrument(
        skip_all,
        fields(action = %self.signature.name(), target = %self.target, round_id = Empty)
    )]
    pub async fn run(&self, ctx: CallContext, cancel: &CancellationToken) -> Result<R> {
        let mut round = RoundTracker::new(self.signature.name());
        Span::current().record("round_id", display(round.round_id()));
        let round_id = round.round_id().to_string();

        let plan = match WorkPlan::resolve(self.init.as_ref(), &self.signature, &ctx) {
            Ok(plan) => plan,
            Err(plan_error) => {
                log_error("parallel_action", "plan", &plan_error.to_string(), Some(&round_id));
                round.transition(RoundState::Failed)?;
                return Err(plan_error.into());
            }
        };

        round.transition(RoundState::Dispatch)?;
        let total = plan.len();
        let dispatcher = TargetDispatcher::for_target(self.target, &self.options);

        let outcomes = match dispatcher
            .dispatch(plan, Arc::clone(&self.action), cancel)
            .await
        {
            Ok(outcomes) => outcomes,
            Err(dispatch_error) => {
                log_error(
                    "parallel_action",
                    "dispatch",
                    &dispatch_error.to_string(),
                    Some(&round_id),
                );
                round.transition(RoundState::Failed)?;
                return Err(dispatch_error.into());
            }
        };

        round.transition(RoundState::Collect)?;
        info!(
            items = total,
            failed = outcomes.failed_count(),
            "Collected outcomes"
        );

        round.transition(RoundState::Aggregate)?;
        let aggregated = match self.failure_policy {
            FailurePolicy::Strict => {
                Strict::new(Arc::clone(&self.post)).aggregate(outcomes, &ctx)
            }
            FailurePolicy::AllowFailures => self.post.aggregate(outcomes, &ctx),
        };

        match aggregated {
            Ok(result) => {
                round.transition(RoundState::Done)?;
                log_round_operation(
                    "aggregate",
                    self.signature.name(),
                    self.target.as_str(),
                    Some(total),
                    "done",
                    None,
                );
                Ok(result)
            }
            Err(aggregate_error) => {
                log_error(
                    "parallel_action",
                    "aggregate",
                    &aggregate_error.to_string(),
                    Some(&round_id),
                );
                round.transition(RoundState::Failed)?;
                Err(BatchflowError::Aggregate(aggregate_error))
            }
        }
    }
}
