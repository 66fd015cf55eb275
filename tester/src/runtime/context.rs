//! Runtime contexts and the seams that build and release them

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::key::CacheKey;
use crate::config::{Profile, TestClass};
use crate::error::BootstrapError;

/// Everything needed to build, or later rebuild, a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub test_class: TestClass,
    pub profile: Option<Profile>,
}

impl BuildRequest {
    pub fn new(test_class: TestClass, profile: Option<Profile>) -> Self {
        Self { test_class, profile }
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::derive(&self.test_class, self.profile.as_ref())
    }
}

/// Access to a built runtime
#[mockall::automock]
#[async_trait::async_trait]
pub trait ContextHandle: Send + Sync {
    /// Settings the runtime exposes to tests
    fn settings(&self) -> HashMap<String, String>;

    /// Tear the runtime down
    async fn release(&self) -> anyhow::Result<()>;
}

/// Builds runtime contexts; the internals of a context are opaque to the cache
#[mockall::automock]
#[async_trait::async_trait]
pub trait ContextBuilder: Send + Sync {
    async fn build(&self, request: &BuildRequest) -> Result<RuntimeContext, BootstrapError>;
}

/// A built runtime a test executes in
pub struct RuntimeContext {
    id: Uuid,
    key: CacheKey,
    created_at: DateTime<Utc>,
    handle: Box<dyn ContextHandle>,
    released: AtomicBool,
}

impl RuntimeContext {
    pub fn new(request: &BuildRequest, handle: impl ContextHandle + 'static) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: request.key(),
            created_at: Utc::now(),
            handle: Box::new(handle),
            released: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Profile identity the context was built for
    pub fn profile(&self) -> &str {
        &self.key.profile
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn settings(&self) -> HashMap<String, String> {
        self.handle.settings()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Release the runtime. Only the first call reaches the handle.
    pub async fn release(&self) -> anyhow::Result<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(context = %self.id, key = %self.key, "Releasing runtime context");
        self.handle.release().await
    }
}

impl fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}
