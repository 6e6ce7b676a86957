//! Positionally addressable component tuples.
//!
//! A [`ComponentTuple`] holds one backing container per schema component and an
//! optional position context. Without a position every accessor works on whole
//! containers; with a position it works on single items inside them.
//!
//! The top-level slot array is copy-on-write: replacing a whole component builds
//! a new slot array, so tuples cloned earlier keep seeing the old container while
//! every untouched component stays shared. Positional writes go into the shared
//! container in place, which is how per-item views write into their batch.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use super::schema::ComponentSchema;
use crate::error::ComponentError;

/// Shared backing storage of one component.
pub type Container<T> = Arc<RwLock<Vec<T>>>;

/// Wrap plain values into a fresh backing container.
pub fn container<T>(values: Vec<T>) -> Container<T> {
    Arc::new(RwLock::new(values))
}

/// Position context of a tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    /// Same index for every component.
    Shared(usize),
    /// One index per component, in schema order.
    PerField(Vec<usize>),
}

impl Position {
    fn for_slot(&self, slot: usize) -> usize {
        match self {
            Self::Shared(position) => *position,
            Self::PerField(positions) => positions[slot],
        }
    }
}

impl From<usize> for Position {
    fn from(position: usize) -> Self {
        Self::Shared(position)
    }
}

impl From<Vec<usize>> for Position {
    fn from(positions: Vec<usize>) -> Self {
        Self::PerField(positions)
    }
}

/// Value read from or written to a component.
pub enum FieldValue<T> {
    /// The whole backing container.
    Whole(Container<T>),
    /// A single item.
    Item(T),
}

impl<T> FieldValue<T> {
    pub fn into_item(self) -> Option<T> {
        match self {
            Self::Item(value) => Some(value),
            Self::Whole(_) => None,
        }
    }

    pub fn into_container(self) -> Option<Container<T>> {
        match self {
            Self::Whole(values) => Some(values),
            Self::Item(_) => None,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for FieldValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whole(values) => f.debug_tuple("Whole").field(&*values.read()).finish(),
            Self::Item(value) => f.debug_tuple("Item").field(value).finish(),
        }
    }
}

/// Named-component view over a batch's data.
pub struct ComponentTuple<T> {
    schema: Arc<ComponentSchema>,
    data: Option<Arc<[Container<T>]>>,
    pos: Option<Position>,
}

impl<T> Clone for ComponentTuple<T> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            data: self.data.clone(),
            pos: self.pos.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ComponentTuple<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTuple")
            .field("schema", &self.schema.name())
            .field("data", &self.data.as_ref().map(|slots| slots.len()))
            .field("pos", &self.pos)
            .finish()
    }
}

impl<T> ComponentTuple<T> {
    /// A tuple with no data; every read returns `None`.
    pub fn new(schema: Arc<ComponentSchema>) -> Self {
        Self {
            schema,
            data: None,
            pos: None,
        }
    }

    /// A tuple owning fresh containers, one per component in schema order.
    pub fn with_data(
        schema: Arc<ComponentSchema>,
        data: Vec<Vec<T>>,
    ) -> Result<Self, ComponentError> {
        Self::from_containers(schema, data.into_iter().map(container).collect())
    }

    /// A tuple over existing containers, which stay shared with their other owners.
    pub fn from_containers(
        schema: Arc<ComponentSchema>,
        containers: Vec<Container<T>>,
    ) -> Result<Self, ComponentError> {
        if containers.len() != schema.len() {
            return Err(ComponentError::DataArity {
                expected: schema.len(),
                found: containers.len(),
            });
        }
        Ok(Self {
            schema,
            data: Some(containers.into()),
            pos: None,
        })
    }

    /// A view sharing this tuple's containers with the given position context.
    pub fn at(&self, pos: impl Into<Position>) -> Result<Self, ComponentError> {
        let pos = pos.into();
        if let Position::PerField(positions) = &pos {
            if positions.len() != self.schema.len() {
                return Err(ComponentError::PositionArity {
                    expected: self.schema.len(),
                    found: positions.len(),
                });
            }
        }
        Ok(Self {
            schema: Arc::clone(&self.schema),
            data: self.data.clone(),
            pos: Some(pos),
        })
    }

    /// A view sharing this tuple's containers with no position context.
    pub fn whole(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            data: self.data.clone(),
            pos: None,
        }
    }

    pub fn schema(&self) -> &Arc<ComponentSchema> {
        &self.schema
    }

    pub fn position(&self) -> Option<&Position> {
        self.pos.as_ref()
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Whole backing container of a component, regardless of position context.
    pub fn field(&self, field: &str) -> Result<Option<Container<T>>, ComponentError> {
        let slot = self.schema.index_of(field)?;
        Ok(self
            .data
            .as_ref()
            .map(|slots| Arc::clone(&slots[slot])))
    }

    /// Number of items stored for a component, zero when there is no data.
    pub fn len_of(&self, field: &str) -> Result<usize, ComponentError> {
        Ok(self
            .field(field)?
            .map(|values| values.read().len())
            .unwrap_or(0))
    }

    /// Whether both tuples reference the very same container for `field`.
    pub fn shares_container(&self, other: &Self, field: &str) -> Result<bool, ComponentError> {
        match (self.field(field)?, other.field(field)?) {
            (Some(mine), Some(theirs)) => Ok(Arc::ptr_eq(&mine, &theirs)),
            _ => Ok(false),
        }
    }

    /// Replace one component's container, leaving every other slot shared.
    ///
    /// Only this tuple sees the new slot array; clones taken earlier keep
    /// pointing at the previous container.
    pub fn replace_container(
        &mut self,
        field: &str,
        values: Container<T>,
    ) -> Result<(), ComponentError> {
        let slot = self.schema.index_of(field)?;
        let mut slots: Vec<Container<T>> = match &self.data {
            Some(current) => current.iter().map(Arc::clone).collect(),
            None => (0..self.schema.len()).map(|_| container(Vec::new())).collect(),
        };
        slots[slot] = values;
        self.data = Some(slots.into());
        Ok(())
    }

    /// Replace one component with fresh values.
    pub fn replace_field(&mut self, field: &str, values: Vec<T>) -> Result<(), ComponentError> {
        self.replace_container(field, container(values))
    }

    /// Write one item in place, visible to every tuple sharing the container.
    pub fn set_at(&self, field: &str, position: usize, value: T) -> Result<(), ComponentError> {
        let slot = self.schema.index_of(field)?;
        let slots = self.data.as_ref().ok_or_else(|| ComponentError::NoData {
            field: field.to_string(),
            position,
        })?;

        let mut values = slots[slot].write();
        let len = values.len();
        match values.get_mut(position) {
            Some(item) => {
                *item = value;
                Ok(())
            }
            None => Err(ComponentError::PositionOutOfRange {
                field: field.to_string(),
                position,
                len,
            }),
        }
    }

    /// Context-dependent write.
    ///
    /// Without a position the value must be a whole container and replaces the
    /// component copy-on-write. With a position the value must be an item and is
    /// written in place at this tuple's position for the component.
    pub fn set(&mut self, field: &str, value: FieldValue<T>) -> Result<(), ComponentError> {
        match (self.pos.clone(), value) {
            (None, FieldValue::Whole(values)) => self.replace_container(field, values),
            (Some(pos), FieldValue::Item(value)) => {
                let slot = self.schema.index_of(field)?;
                self.set_at(field, pos.for_slot(slot), value)
            }
            (None, FieldValue::Item(_)) => Err(ComponentError::ValueShape {
                field: field.to_string(),
                expected: "a whole container when no position is set",
            }),
            (Some(_), FieldValue::Whole(_)) => Err(ComponentError::ValueShape {
                field: field.to_string(),
                expected: "a single item when a position is set",
            }),
        }
    }
}

impl<T: Clone> ComponentTuple<T> {
    /// Read one item, `None` when the tuple has no data.
    pub fn get_at(&self, field: &str, position: usize) -> Result<Option<T>, ComponentError> {
        let slot = self.schema.index_of(field)?;
        let Some(slots) = &self.data else {
            return Ok(None);
        };

        let values = slots[slot].read();
        values
            .get(position)
            .cloned()
            .map(Some)
            .ok_or_else(|| ComponentError::PositionOutOfRange {
                field: field.to_string(),
                position,
                len: values.len(),
            })
    }

    /// Context-dependent read.
    ///
    /// `None` without data, the whole container without a position, otherwise
    /// the item at this tuple's position for the component.
    pub fn get(&self, field: &str) -> Result<Option<FieldValue<T>>, ComponentError> {
        let slot = self.schema.index_of(field)?;
        match &self.pos {
            None => Ok(self.field(field)?.map(FieldValue::Whole)),
            Some(pos) => Ok(self
                .get_at(field, pos.for_slot(slot))?
                .map(FieldValue::Item)),
        }
    }

    /// Snapshot of a component's values.
    pub fn values(&self, field: &str) -> Result<Option<Vec<T>>, ComponentError> {
        Ok(self.field(field)?.map(|values| values.read().clone()))
    }
}
