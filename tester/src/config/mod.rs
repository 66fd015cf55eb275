//! Configuration Management
//!
//! Test classes, profiles, the configuration groups compared for managed
//! service reuse, and the JSON suite plan.

pub mod builder;
pub mod model;
pub mod plan;
pub mod settings;

// Re-export main types
pub use builder::{ProfileBuilder, TestClassBuilder};
pub use model::{Profile, TestClass, TestResource};
pub use plan::{CommandSpec, SuitePlan, TestSpec};
pub use settings::{DevServicesConfig, ServiceConfig};
