//! Immutable component schemas.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ComponentError, SchemaError};

/// Ordered, fixed set of component names for one batch type.
///
/// Built once at start-up and shared behind an [`Arc`]; there is no way to add
/// or remove a component afterwards.
#[derive(Debug, PartialEq, Eq)]
pub struct ComponentSchema {
    name: String,
    fields: Vec<String>,
    slots: HashMap<String, usize>,
}

impl ComponentSchema {
    /// Build a schema from an ordered list of unique component names.
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Result<Arc<Self>, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let mut ordered = Vec::new();
        let mut slots = HashMap::new();

        for (slot, field) in fields.into_iter().enumerate() {
            let field = field.into();
            if field.trim().is_empty() {
                return Err(SchemaError::EmptyName {
                    schema: name,
                    slot,
                });
            }
            if slots.insert(field.clone(), slot).is_some() {
                return Err(SchemaError::DuplicateField {
                    schema: name,
                    field,
                });
            }
            ordered.push(field);
        }

        Ok(Arc::new(Self {
            name,
            fields: ordered,
            slots,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Component names in declaration order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.slots.contains_key(field)
    }

    /// Storage slot of a component.
    pub fn index_of(&self, field: &str) -> Result<usize, ComponentError> {
        self.slots
            .get(field)
            .copied()
            .ok_or_else(|| ComponentError::UnknownField {
                schema: self.name.clone(),
                field: field.to_string(),
            })
    }
}

impl fmt::Display for ComponentSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.fields.join(", "))
    }
}
