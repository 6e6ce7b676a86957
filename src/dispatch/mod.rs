//! # Parallel Dispatch
//!
//! Expands an action's init specification into a [`WorkPlan`], runs every
//! [`WorkItem`] under a [`ConcurrencyTarget`], collects one [`Outcome`] per
//! position in input order and hands them to an [`Aggregator`].
//!
//! ## Components
//!
//! - [`plan`]: call context, action signatures, init specifications and work plans
//! - [`item_action`]: the per-item unit of work
//! - [`dispatcher`]: sequential, thread-pool and cooperative strategies
//! - [`outcome`]: per-item results and the position-indexed collector
//! - [`aggregate`]: post steps, including strict failure handling
//! - [`state`]: round lifecycle tracking
//! - [`action`]: the declared parallel action tying everything together

pub mod action;
pub mod aggregate;
pub mod dispatcher;
pub mod item_action;
pub mod outcome;
pub mod plan;
pub mod state;

pub use action::{AggregatorRef, FailurePolicy, ParallelAction};
pub use aggregate::{
    aggregator_fn, ensure_no_failures, Aggregator, CollectSuccesses, Concat, FnAggregator, Strict,
};
pub use dispatcher::{
    default_max_workers, ConcurrencyTarget, CooperativeDispatcher, DispatchOptions, Dispatcher,
    SequentialDispatcher, TargetDispatcher, ThreadPoolDispatcher,
};
pub use item_action::{action_fn, blocking, BlockingAction, FnAction, ItemAction};
pub use outcome::{any_failed, Outcome, OutcomeCollector, Outcomes};
pub use plan::{
    ActionSignature, Args, CallContext, InitProducer, InitSpec, Options, WorkItem, WorkPlan,
};
pub use state::{RoundState, RoundTracker, RoundTransition};
