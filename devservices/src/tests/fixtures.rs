//! Test fixtures for devservices tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::lifecycle::{ManagedService, ServiceHandle};
use crate::registry::ServiceRegistry;
use shared::{ConfigComparator, ConfigValue, LaunchMode, Owner, ShapeDescriptor, ShapeRegistry, SimpleGroup};

/// Release handle that counts how often it was stopped
#[derive(Clone, Default)]
pub struct CountingHandle {
    pub stops: Arc<AtomicUsize>,
}

impl CountingHandle {
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ServiceHandle for CountingHandle {
    async fn stop(&self) -> anyhow::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Release handle whose stop always fails
pub struct FailingHandle;

#[async_trait::async_trait]
impl ServiceHandle for FailingHandle {
    async fn stop(&self) -> anyhow::Result<()> {
        anyhow::bail!("container runtime unreachable")
    }
}

pub fn test_comparator() -> ConfigComparator {
    let shapes = ShapeRegistry::new()
        .with_shape(ShapeDescriptor::mapping("devservices").accessor("enabled").accessor("timeout"))
        .with_shape(ShapeDescriptor::mapping("dummy").accessor("name").accessor("port"));
    ConfigComparator::new(Arc::new(shapes))
}

pub fn create_test_registry() -> ServiceRegistry {
    ServiceRegistry::new(test_comparator())
}

pub fn test_owner() -> Owner {
    Owner::new("svc", LaunchMode::Test, "cfg")
}

pub fn global_settings() -> ConfigValue {
    ConfigValue::group(SimpleGroup::new("devservices").with("enabled", true).with("timeout", 60))
}

pub fn dummy_config(name: &str, port: i32) -> ConfigValue {
    ConfigValue::group(SimpleGroup::new("dummy").with("name", name).with("port", port))
}

/// Config whose shape was never registered
pub fn unregistered_config() -> ConfigValue {
    ConfigValue::group(SimpleGroup::new("unregistered").with("x", 1))
}

pub fn counted_service(name: &str) -> (ManagedService, CountingHandle) {
    let handle = CountingHandle::default();
    (ManagedService::new(name, handle.clone()), handle)
}
