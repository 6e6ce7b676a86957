//! # Work Plan Resolution
//!
//! Expands an action's init specification into the ordered list of
//! [`WorkItem`]s dispatched in one round. Resolution never executes anything.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ItemError, PlanError};

/// Positional arguments of one init entry.
pub type Args = Vec<Value>;

/// Named options passed alongside positional arguments.
pub type Options = Map<String, Value>;

/// Arguments an action was invoked with.
///
/// Positional arguments are appended to every work item after the init entry;
/// options are copied into every work item. The aggregator sees the same context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallContext {
    #[serde(default)]
    pub args: Args,
    #[serde(default)]
    pub options: Options,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }
}

/// Per-item parameter list of an action, minus the implicit item receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSignature {
    name: String,
    params: Arc<[String]>,
}

impl ActionSignature {
    pub fn new<I, S>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Number of positional arguments each init entry must provide.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Producer of init entries, evaluated once per round.
pub trait InitProducer: Send + Sync {
    fn produce(&self) -> anyhow::Result<Vec<Args>>;
}

impl<F> InitProducer for F
where
    F: Fn() -> anyhow::Result<Vec<Args>> + Send + Sync,
{
    fn produce(&self) -> anyhow::Result<Vec<Args>> {
        self()
    }
}

/// Where a round's init entries come from.
#[derive(Clone)]
pub enum InitSpec {
    Fixed(Vec<Args>),
    Producer(Arc<dyn InitProducer>),
}

impl InitSpec {
    pub fn fixed(entries: Vec<Args>) -> Self {
        Self::Fixed(entries)
    }

    pub fn producer<F>(producer: F) -> Self
    where
        F: Fn() -> anyhow::Result<Vec<Args>> + Send + Sync + 'static,
    {
        Self::Producer(Arc::new(producer))
    }

    fn entries(&self, action: &str) -> Result<Vec<Args>, PlanError> {
        match self {
            Self::Fixed(entries) => Ok(entries.clone()),
            Self::Producer(producer) => producer.produce().map_err(|e| PlanError::Producer {
                action: action.to_string(),
                reason: format!("{e:#}"),
            }),
        }
    }
}

impl fmt::Debug for InitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(entries) => f.debug_tuple("Fixed").field(&entries.len()).finish(),
            Self::Producer(_) => f.write_str("Producer"),
        }
    }
}

/// One unit of dispatched work.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    position: usize,
    params: Arc<[String]>,
    args: Args,
    options: Options,
}

impl WorkItem {
    /// Stable index of this item within its round.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Positional argument bound to a declared parameter name.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .position(|param| param == name)
            .and_then(|index| self.args.get(index))
    }

    /// String parameter, failing the item when it is missing or not a string.
    pub fn param_str(&self, name: &str) -> Result<&str, ItemError> {
        self.param(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ItemError::invalid_input(format!("parameter '{name}' is not a string")))
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }
}

/// Ordered work items for one dispatch round, numbered `0..N-1`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkPlan {
    action: String,
    items: Vec<WorkItem>,
}

impl WorkPlan {
    /// Expand an init specification against the action signature.
    pub fn resolve(
        init: Option<&InitSpec>,
        signature: &ActionSignature,
        ctx: &CallContext,
    ) -> Result<Self, PlanError> {
        let action = signature.name();
        let init = init.ok_or_else(|| PlanError::MissingInit {
            action: action.to_string(),
        })?;

        let entries = init.entries(action)?;
        let mut items = Vec::with_capacity(entries.len());

        for (position, entry) in entries.into_iter().enumerate() {
            if entry.len() != signature.arity() {
                return Err(PlanError::ArityMismatch {
                    action: action.to_string(),
                    position,
                    expected: signature.arity(),
                    found: entry.len(),
                });
            }

            let mut args = entry;
            args.extend(ctx.args.iter().cloned());
            items.push(WorkItem {
                position,
                params: Arc::clone(&signature.params),
                args,
                options: ctx.options.clone(),
            });
        }

        debug!(action = %action, items = items.len(), "Resolved work plan");

        Ok(Self {
            action: action.to_string(),
            items,
        })
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<WorkItem> {
        self.items
    }
}
