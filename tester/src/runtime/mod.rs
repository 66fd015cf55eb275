//! Runtime Management
//!
//! Runtime contexts, the keyed cache that decides when they are reused, and
//! the process-backed builder that creates them.

pub mod cache;
pub mod context;
pub mod key;
pub mod launcher;

pub use cache::{CacheStats, ContextCache, ContextState};
pub use context::{BuildRequest, ContextBuilder, ContextHandle, MockContextBuilder, MockContextHandle, RuntimeContext};
pub use key::{CacheKey, ResourceFingerprint};
pub use launcher::ProcessContextBuilder;
