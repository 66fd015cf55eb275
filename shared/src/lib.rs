//! Shared types for the test runtime workspace
//!
//! Contains the data model used by both the managed-service registry and the
//! runtime context cache: service owners, launch modes, and the configuration
//! value model with its structural comparator.

pub mod config;
pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;

pub use config::{
    AccessorDescriptor, ConfigComparator, ConfigGroup, ConfigValue, ShapeDescriptor, ShapeKind,
    ShapeRegistry, SimpleGroup, Visibility,
};
