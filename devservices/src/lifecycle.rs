//! Managed service lifecycle wrapper
//!
//! A [`ManagedService`] is the state holder every managed dependency exposes to
//! the registry: running flag, static settings, lazily evaluated settings and
//! the release handle. Settings reads never take a lock, they sit on the hot
//! path of every configuration lookup made by a running test.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{DevServicesError, DevServicesResult};
use shared::Owner;

/// Setting whose value is only known once the dependency is fully up
pub type LazySetting = Arc<dyn Fn() -> String + Send + Sync>;

/// Release action of a managed service
///
/// Implemented by whatever actually runs the dependency (a container client,
/// a child process). Called at most once per service.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ServiceHandle: Send + Sync {
    /// Stop the external dependency and free its resources
    async fn stop(&self) -> anyhow::Result<()>;
}

/// A running external dependency
pub struct ManagedService {
    name: String,
    description: Option<String>,
    container_id: Option<String>,
    settings: HashMap<String, String>,
    lazy_settings: HashMap<String, LazySetting>,
    running: AtomicBool,
    started_at: DateTime<Utc>,
    handle: Mutex<Option<Box<dyn ServiceHandle>>>,
}

impl ManagedService {
    /// Wrap a started dependency; it becomes running once registered
    pub fn new(name: impl Into<String>, handle: impl ServiceHandle + 'static) -> Self {
        Self {
            name: name.into(),
            description: None,
            container_id: None,
            settings: HashMap::new(),
            lazy_settings: HashMap::new(),
            running: AtomicBool::new(false),
            started_at: Utc::now(),
            handle: Mutex::new(Some(Box::new(handle))),
        }
    }

    /// Set a human readable description (fluent API)
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the container or process identifier (fluent API)
    pub fn with_container_id(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = Some(container_id.into());
        self
    }

    /// Add a setting injected into the application under test (fluent API)
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Add a lazily evaluated setting (fluent API)
    pub fn with_lazy_setting<F>(mut self, key: impl Into<String>, supplier: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.lazy_settings.insert(key.into(), Arc::new(supplier));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn container_id(&self) -> Option<&str> {
        self.container_id.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Static settings only
    pub fn settings(&self) -> &HashMap<String, String> {
        &self.settings
    }

    /// Static settings merged with the current value of every lazy setting
    pub fn dynamic_settings(&self) -> HashMap<String, String> {
        let mut merged = self.settings.clone();
        for (key, supplier) in &self.lazy_settings {
            merged.insert(key.clone(), supplier());
        }
        merged
    }

    /// Current value of one setting, lazy settings included
    pub fn setting(&self, key: &str) -> Option<String> {
        if let Some(supplier) = self.lazy_settings.get(key) {
            return Some(supplier());
        }
        self.settings.get(key).cloned()
    }

    pub(crate) fn mark_running(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Stop the service. The release handle runs exactly once; later calls
    /// are no-ops.
    pub async fn close(&self) -> DevServicesResult<()> {
        self.running.store(false, Ordering::Release);
        let handle = self.handle.lock().await.take();
        match handle {
            Some(handle) => handle.stop().await.map_err(|e| DevServicesError::ServiceStop {
                service: self.name.clone(),
                message: format!("{e:#}"),
            }),
            None => Ok(()),
        }
    }

    /// Serializable view for diagnostics
    pub fn summary(&self, owner: &Owner) -> ServiceSummary {
        ServiceSummary {
            owner: owner.to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            container_id: self.container_id.clone(),
            started_at: self.started_at,
            running: self.is_running(),
            settings: self.dynamic_settings().into_iter().collect(),
        }
    }
}

impl fmt::Debug for ManagedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedService")
            .field("name", &self.name)
            .field("container_id", &self.container_id)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Diagnostics entry for a running service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub container_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub running: bool,
    pub settings: BTreeMap<String, String>,
}
