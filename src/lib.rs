#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Batchflow Core
//!
//! Parallel action dispatch and named-component addressing for
//! batch-processing pipelines.
//!
//! ## Overview
//!
//! A pipeline action declares where its work items come from (`init`), how
//! they are scheduled (`target`) and how their results are combined (`post`).
//! Each round expands the init source into a work plan, runs every item under
//! the chosen concurrency target, collects exactly one outcome per item in
//! input order and hands the ordered outcomes to the aggregator. A failing
//! item never aborts its siblings; by default the round raises once all items
//! have resolved if any of them failed.
//!
//! Batch data lives in component tuples: a fixed schema of named fields, each
//! backed by a shared container. Per-item views address a single position so
//! concurrently running items can write their own slot of the batch.
//!
//! ## Module Organization
//!
//! - [`components`] - Component schemas and tuples with whole or positional access
//! - [`dispatch`] - Work plans, dispatchers, outcome collection and aggregation
//! - [`batch`] - Item index plus components, per-item views and plans
//! - [`registry`] - Name-based resolution of init sources and aggregators
//! - [`config`] - Dispatch defaults from files and environment
//! - [`logging`] - Structured logging initialization
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batchflow_core::dispatch::{
//!     action_fn, ActionSignature, CallContext, CollectSuccesses, ConcurrencyTarget, InitSpec,
//!     ParallelAction, WorkItem,
//! };
//! use batchflow_core::error::ItemError;
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> batchflow_core::Result<()> {
//! batchflow_core::logging::init_structured_logging();
//!
//! let square = ParallelAction::new(
//!     ActionSignature::new("square", ["n"]),
//!     action_fn(|item: WorkItem| async move {
//!         let n = item.param("n").and_then(|v| v.as_i64()).unwrap_or_default();
//!         Ok::<_, ItemError>(n * n)
//!     }),
//!     CollectSuccesses,
//! )
//! .init(InitSpec::fixed((1..=4).map(|n| vec![json!(n)]).collect()))
//! .target(ConcurrencyTarget::Cooperative);
//!
//! let squares = square.run(CallContext::new(), &CancellationToken::new()).await?;
//! assert_eq!(squares, vec![1, 4, 9, 16]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and property tests
//! cargo bench --features benchmarks
//! ```

pub mod batch;
pub mod components;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod registry;

pub use batch::Batch;
pub use components::{ComponentSchema, ComponentTuple, FieldValue, Position};
pub use config::{DispatchSettings, LogFormat, SettingsLoader};
pub use dispatch::{
    any_failed, ActionSignature, CallContext, ConcurrencyTarget, FailurePolicy, InitSpec,
    ItemAction, Outcome, Outcomes, ParallelAction, WorkItem, WorkPlan,
};
pub use error::{
    AggregateError, BatchflowError, ComponentError, ConfigError, DispatchError, ItemError,
    ItemErrorKind, PlanError, Result, SchemaError,
};
pub use registry::{ActionOptions, ActionRegistry};
