//! # Registry Infrastructure
//!
//! Name-based resolution of init producers and aggregators for declaratively
//! configured parallel actions.

pub mod action_registry;

pub use action_registry::{ActionOptions, ActionRegistry, RegistryStats};
