//! # Batches
//!
//! A batch is an ordered index of item ids plus the named components holding
//! one value per item. Per-item parallel actions run one work item per batch
//! position and address their item through [`Batch::item`].

use serde_json::json;
use std::fmt;
use std::sync::Arc;

use crate::components::{ComponentSchema, ComponentTuple};
use crate::dispatch::{ActionSignature, CallContext, InitSpec, WorkPlan};
use crate::error::{ComponentError, PlanError};

/// Parameter name carrying the item id in per-item work plans.
pub const ITEM_PARAM: &str = "item";

/// Item ids and their components.
pub struct Batch<T> {
    index: Arc<[String]>,
    components: ComponentTuple<T>,
}

impl<T> Clone for Batch<T> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            components: self.components.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Batch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("index", &self.index)
            .field("components", &self.components)
            .finish()
    }
}

impl<T> Batch<T> {
    /// Every component that holds data must hold exactly one value per id.
    pub fn new(
        index: Vec<String>,
        components: ComponentTuple<T>,
    ) -> Result<Self, ComponentError> {
        let components = components.whole();
        for field in components.schema().fields() {
            let found = components.len_of(field)?;
            if components.has_data() && found != index.len() {
                return Err(ComponentError::LengthMismatch {
                    field: field.clone(),
                    expected: index.len(),
                    found,
                });
            }
        }
        Ok(Self {
            index: index.into(),
            components,
        })
    }

    /// A batch with fresh containers, one per component in schema order.
    pub fn with_data(
        index: Vec<String>,
        schema: Arc<ComponentSchema>,
        data: Vec<Vec<T>>,
    ) -> Result<Self, ComponentError> {
        Self::new(index, ComponentTuple::with_data(schema, data)?)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn components(&self) -> &ComponentTuple<T> {
        &self.components
    }

    /// Whole-field replacements go through here; positional views taken
    /// before a replacement keep the old container.
    pub fn components_mut(&mut self) -> &mut ComponentTuple<T> {
        &mut self.components
    }

    /// Position of an item id.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.index.iter().position(|candidate| candidate == id)
    }

    /// A view of item `pos`; writes through it land in the batch's containers.
    pub fn item(&self, pos: usize) -> Result<ComponentTuple<T>, ComponentError> {
        if pos >= self.len() {
            return Err(ComponentError::PositionOutOfRange {
                field: ITEM_PARAM.to_string(),
                position: pos,
                len: self.len(),
            });
        }
        self.components.at(pos)
    }

    /// One init entry per item, carrying the item id.
    pub fn inbatch_init(&self) -> InitSpec {
        InitSpec::fixed(self.index.iter().map(|id| vec![json!(id)]).collect())
    }

    /// A plan with item `i` of the batch at position `i`.
    pub fn inbatch_plan(&self, action: &str) -> Result<WorkPlan, PlanError> {
        let signature = ActionSignature::new(action, [ITEM_PARAM]);
        WorkPlan::resolve(Some(&self.inbatch_init()), &signature, &CallContext::new())
    }
}
