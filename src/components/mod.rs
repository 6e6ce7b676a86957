//! # Named Components
//!
//! Schemas of named batch components and the tuples that address them either
//! whole or at a single item position.

pub mod schema;
pub mod tuple;

pub use schema::ComponentSchema;
pub use tuple::{container, ComponentTuple, Container, FieldValue, Position};
