//! # Action Registry
//!
//! Named init producers and aggregators, so actions can be declared with
//! string references (`init = "urls"`, `post = "concat"`, `target = "threads"`)
//! and resolved into a runnable [`ParallelAction`].
//!
//! ## Usage
//!
//! ```rust
//! use batchflow_core::dispatch::{
//!     action_fn, ActionSignature, Concat, ConcurrencyTarget, InitSpec, WorkItem,
//! };
//! use batchflow_core::error::ItemError;
//! use batchflow_core::registry::{ActionOptions, ActionRegistry};
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry: ActionRegistry<Vec<String>, Vec<String>> = ActionRegistry::new();
//! registry.register_init("urls", InitSpec::fixed(vec![vec![json!("http://a/x.zip")]]));
//! registry.register_aggregator("concat", Concat);
//!
//! let options: ActionOptions =
//!     serde_json::from_str(r#"{"init": "urls", "post": "concat", "target": "t"}"#)?;
//! let action = registry.build(
//!     ActionSignature::new("download", ["url"]),
//!     action_fn(|item: WorkItem| async move {
//!         Ok::<_, ItemError>(vec![item.param_str("url")?.to_string()])
//!     }),
//!     &options,
//! )?;
//! assert_eq!(action.current_target(), ConcurrencyTarget::ThreadPool);
//! # Ok(())
//! # }
//! ```

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dispatch::{
    ActionSignature, Aggregator, AggregatorRef, ConcurrencyTarget, InitSpec, ItemAction,
    ParallelAction,
};
use crate::error::{AggregateError, PlanError, Result};

/// String-keyed declaration of a parallel action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionOptions {
    /// Registered init producer; absent means the round fails to plan
    #[serde(default)]
    pub init: Option<String>,
    /// Registered aggregator
    pub post: String,
    /// Concurrency target, any accepted alias
    #[serde(default)]
    pub target: Option<ConcurrencyTarget>,
}

impl ActionOptions {
    pub fn new(post: impl Into<String>) -> Self {
        Self {
            post: post.into(),
            ..Self::default()
        }
    }

    pub fn with_init(mut self, init: impl Into<String>) -> Self {
        self.init = Some(init.into());
        self
    }

    pub fn with_target(mut self, target: ConcurrencyTarget) -> Self {
        self.target = Some(target);
        self
    }
}

/// Registry statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub init_producers: usize,
    pub aggregators: usize,
}

/// Registry of init sources and aggregators for actions producing `T` and
/// aggregating into `R`.
pub struct ActionRegistry<T, R> {
    inits: RwLock<HashMap<String, InitSpec>>,
    aggregators: RwLock<HashMap<String, AggregatorRef<T, R>>>,
}

impl<T, R> Default for ActionRegistry<T, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> fmt::Debug for ActionRegistry<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("inits", &self.init_names())
            .field("aggregators", &self.aggregator_names())
            .finish()
    }
}

impl<T, R> ActionRegistry<T, R> {
    pub fn new() -> Self {
        Self {
            inits: RwLock::new(HashMap::new()),
            aggregators: RwLock::new(HashMap::new()),
        }
    }

    /// Register an init source, replacing any previous one with the same name.
    pub fn register_init(&self, name: impl Into<String>, init: InitSpec) {
        let name = name.into();
        debug!(name = %name, init = ?init, "Registering init producer");
        self.inits.write().insert(name, init);
    }

    /// Register an aggregator, replacing any previous one with the same name.
    pub fn register_aggregator<P>(&self, name: impl Into<String>, aggregator: P)
    where
        P: Aggregator<T, Output = R> + 'static,
    {
        let name = name.into();
        debug!(name = %name, "Registering aggregator");
        self.aggregators.write().insert(name, Arc::new(aggregator));
    }

    pub fn init(&self, name: &str) -> std::result::Result<InitSpec, PlanError> {
        self.inits
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PlanError::UnknownProducer {
                name: name.to_string(),
            })
    }

    pub fn aggregator(
        &self,
        name: &str,
    ) -> std::result::Result<AggregatorRef<T, R>, AggregateError> {
        self.aggregators
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AggregateError::UnknownAggregator {
                name: name.to_string(),
            })
    }

    pub fn init_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inits.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn aggregator_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.aggregators.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            init_producers: self.inits.read().len(),
            aggregators: self.aggregators.read().len(),
        }
    }

    /// Resolve `options` into a runnable action.
    pub fn build<A>(
        &self,
        signature: ActionSignature,
        action: A,
        options: &ActionOptions,
    ) -> Result<ParallelAction<A, R>>
    where
        A: ItemAction<Output = T>,
        T: fmt::Debug,
    {
        let post = self.aggregator(&options.post)?;
        let mut parallel = ParallelAction::from_parts(signature, Arc::new(action), post);

        if let Some(init) = &options.init {
            parallel = parallel.init(self.init(init)?);
        }
        if let Some(target) = options.target {
            parallel = parallel.target(target);
        }

        info!(
            action = %parallel.signature().name(),
            init = ?options.init,
            post = %options.post,
            target = %parallel.current_target(),
            "Resolved parallel action"
        );
        Ok(parallel)
    }
}
