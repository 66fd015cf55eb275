//! Test Runtime
//!
//! Runs test classes against runtime contexts that are reused for as long as
//! their configuration stays the same, together with the managed services the
//! contexts depend on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tester::*;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let plan = Arc::new(SuitePlan::load("plan.json")?);
//! let registry = Arc::new(devservices::ServiceRegistry::new(config::settings::comparator()));
//! let builder = ProcessContextBuilder::from_plan(registry.clone(), &plan);
//! let cache = Arc::new(ContextCache::new(Arc::new(builder)));
//!
//! let report = SuiteRunner::new(plan, cache.clone(), registry.clone())
//!     .with_parallelism(4)
//!     .run()
//!     .await;
//! assert!(report.is_success());
//!
//! cache.close().await;
//! registry.shutdown().await;
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod runtime;
pub mod scenarios;

// Main interfaces - re-exported at crate root for convenience
pub use config::{CommandSpec, DevServicesConfig, Profile, ServiceConfig, SuitePlan, TestClass, TestResource, TestSpec};
pub use error::{BootstrapError, CacheError, CacheResult, TesterError, TesterResult};
pub use runtime::{BuildRequest, CacheKey, ContextBuilder, ContextCache, ContextHandle, ContextState, RuntimeContext};
pub use scenarios::{SuiteReport, SuiteRunner, TestOutcome, TestStatus};

// Supporting types
pub use runtime::{CacheStats, ProcessContextBuilder, ResourceFingerprint};
