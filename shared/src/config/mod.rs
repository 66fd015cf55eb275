//! Configuration value model
//!
//! Configuration values may be produced independently in separate isolation
//! domains, each with its own concrete type for the same logical shape. They
//! are therefore compared through the accessors declared for their shape in a
//! [`ShapeRegistry`], never by identity or concrete type.

pub mod comparator;
pub mod shape;
pub mod value;

pub use comparator::ConfigComparator;
pub use shape::{AccessorDescriptor, ShapeDescriptor, ShapeKind, ShapeRegistry, Visibility};
pub use value::{ConfigGroup, ConfigValue, SimpleGroup};
