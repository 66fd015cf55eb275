//! Managed-service registry
//!
//! Tracks every running managed service, indexed by owner and by comparable
//! key, and implements the reuse-or-restart protocol features run each time a
//! test needs their service:
//!
//! 1. a service matching the required key is reused as is;
//! 2. otherwise every service of the same owner is stopped first;
//! 3. then a new service is started and registered.
//!
//! The protocol is serialised per owner, so two callers never start services
//! for the same owner concurrently and switching profiles never leaves two
//! same-owner services running.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::{DevServicesError, DevServicesResult};
use crate::key::ComparableKey;
use crate::lifecycle::{ManagedService, ServiceSummary};
use shared::{logging, owner_debug, owner_info, owner_warn, ConfigComparator, ConfigValue, Owner};

#[derive(Clone)]
struct Registration {
    key: ComparableKey,
    service: Arc<ManagedService>,
}

/// All indexes live behind one lock so they are always mutated together
#[derive(Default)]
struct RegistryIndexes {
    by_owner: HashMap<Owner, Vec<Registration>>,
    by_key: HashMap<u64, Vec<Registration>>,
    running: Vec<Registration>,
    closed: bool,
}

impl RegistryIndexes {
    fn insert(&mut self, hash: u64, registration: Registration) {
        self.by_owner
            .entry(registration.key.owner().clone())
            .or_default()
            .push(registration.clone());
        self.by_key.entry(hash).or_default().push(registration.clone());
        self.running.push(registration);
    }

    fn remove(&mut self, owner: &Owner, service: &Arc<ManagedService>) -> bool {
        let before = self.running.len();
        self.running.retain(|r| !Arc::ptr_eq(&r.service, service));

        if let Some(entries) = self.by_owner.get_mut(owner) {
            entries.retain(|r| !Arc::ptr_eq(&r.service, service));
            if entries.is_empty() {
                self.by_owner.remove(owner);
            }
        }
        // Key buckets are scanned by identity so removal never needs the
        // fallible structural hash
        self.by_key.retain(|_, entries| {
            entries.retain(|r| !Arc::ptr_eq(&r.service, service));
            !entries.is_empty()
        });

        self.running.len() != before
    }
}

/// Registry of running managed services
///
/// Constructed once per process and shared through an `Arc`; tests create
/// independent instances.
pub struct ServiceRegistry {
    comparator: ConfigComparator,
    indexes: RwLock<RegistryIndexes>,
    owner_locks: Mutex<HashMap<Owner, Arc<Mutex<()>>>>,
}

impl ServiceRegistry {
    pub fn new(comparator: ConfigComparator) -> Self {
        Self {
            comparator,
            indexes: RwLock::new(RegistryIndexes::default()),
            owner_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn comparator(&self) -> &ConfigComparator {
        &self.comparator
    }

    /// Services registered under a structurally equal key
    pub async fn lookup_by_key(&self, key: &ComparableKey) -> DevServicesResult<Vec<Arc<ManagedService>>> {
        let hash = self.key_hash(key)?;
        let indexes = self.indexes.read().await;
        let mut matches = Vec::new();
        if let Some(bucket) = indexes.by_key.get(&hash) {
            for registration in bucket {
                let equal = registration
                    .key
                    .matches(key, &self.comparator)
                    .map_err(|source| comparison_error(key.owner(), source))?;
                if equal {
                    matches.push(registration.service.clone());
                }
            }
        }
        Ok(matches)
    }

    /// Every service of an owner, whatever its settings
    pub async fn lookup_by_owner(&self, owner: &Owner) -> Vec<Arc<ManagedService>> {
        let indexes = self.indexes.read().await;
        indexes
            .by_owner
            .get(owner)
            .map(|entries| entries.iter().map(|r| r.service.clone()).collect())
            .unwrap_or_default()
    }

    /// Insert a started service into every index and mark it running.
    ///
    /// Registering the same service twice is a caller bug. Fails once the
    /// registry has been shut down.
    pub async fn register(&self, key: ComparableKey, service: Arc<ManagedService>) -> DevServicesResult<()> {
        let hash = self.key_hash(&key)?;
        let mut indexes = self.indexes.write().await;
        if indexes.closed {
            return Err(DevServicesError::RegistryClosed);
        }
        owner_debug!(key.owner(), service = %service.name(), "Registering managed service");
        service.mark_running();
        indexes.insert(hash, Registration { key, service });
        Ok(())
    }

    /// Remove a service from every index; absent services are ignored
    pub async fn unregister(&self, key: &ComparableKey, service: &Arc<ManagedService>) {
        let removed = self.indexes.write().await.remove(key.owner(), service);
        if !removed {
            owner_debug!(key.owner(), service = %service.name(), "Service was not registered");
        }
    }

    /// Return a running service compatible with the required settings,
    /// stopping stale same-owner services and starting a new one if needed.
    pub async fn request_service<F, Fut>(
        &self,
        owner: Owner,
        global: Option<ConfigValue>,
        feature: Option<ConfigValue>,
        starter: F,
    ) -> DevServicesResult<Arc<ManagedService>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<ManagedService>>,
    {
        let owner_lock = self.owner_lock(&owner).await;
        let _guard = owner_lock.lock().await;

        if self.indexes.read().await.closed {
            return Err(DevServicesError::RegistryClosed);
        }

        let required = ComparableKey::new(owner.clone(), global, feature);
        let matches = match self.lookup_by_key(&required).await {
            Ok(matches) => matches,
            Err(e) => {
                owner_warn!(owner, error = %e, "Could not compare running services");
                return Err(e);
            }
        };
        if let Some(existing) = matches.into_iter().next() {
            owner_debug!(owner, service = %existing.name(), "Reusing running managed service");
            return Ok(existing);
        }

        let stopped = self.stop_owner(&owner, "settings changed").await;
        if stopped > 0 {
            owner_info!(owner, stopped, "Stopped stale managed services");
        }

        let service = starter().await.map_err(|e| DevServicesError::ServiceStart {
            owner: owner.to_string(),
            message: format!("{e:#}"),
        })?;
        let service = Arc::new(service);
        logging::log_service_started(&owner, service.name());

        if let Err(e) = self.register(required, service.clone()).await {
            // Unregistrable services would leak; stop them before reporting
            if let Err(stop_error) = service.close().await {
                owner_warn!(owner, error = %stop_error, "Failed to stop unregistrable service");
            }
            return Err(e);
        }
        Ok(service)
    }

    /// Snapshot of every running service
    pub async fn running_services(&self) -> Vec<Arc<ManagedService>> {
        let indexes = self.indexes.read().await;
        indexes.running.iter().map(|r| r.service.clone()).collect()
    }

    /// Current settings of every running service, merged
    pub async fn dynamic_settings(&self) -> HashMap<String, String> {
        let mut merged = HashMap::new();
        for service in self.running_services().await {
            merged.extend(service.dynamic_settings());
        }
        merged
    }

    /// Serializable view of every running service
    pub async fn diagnostics(&self) -> Vec<ServiceSummary> {
        let indexes = self.indexes.read().await;
        indexes
            .running
            .iter()
            .map(|r| r.service.summary(r.key.owner()))
            .collect()
    }

    /// Stop and unregister every service and refuse later registrations.
    /// Returns the number stopped.
    pub async fn shutdown(&self) -> usize {
        let registrations = {
            let mut indexes = self.indexes.write().await;
            indexes.closed = true;
            indexes.by_owner.clear();
            indexes.by_key.clear();
            std::mem::take(&mut indexes.running)
        };
        let count = registrations.len();
        for registration in registrations {
            self.stop_registration(&registration, "registry shutdown").await;
        }
        if count > 0 {
            tracing::info!(count, "✅ Managed services shut down");
        }
        count
    }

    /// Stop every service of an owner. Stop failures are logged and the
    /// service is unregistered regardless.
    async fn stop_owner(&self, owner: &Owner, reason: &str) -> usize {
        let stale: Vec<Registration> = {
            let indexes = self.indexes.read().await;
            indexes.by_owner.get(owner).cloned().unwrap_or_default()
        };
        for registration in &stale {
            self.unregister(&registration.key, &registration.service).await;
            self.stop_registration(registration, reason).await;
        }
        stale.len()
    }

    async fn stop_registration(&self, registration: &Registration, reason: &str) {
        let owner = registration.key.owner();
        logging::log_service_stop(owner, registration.service.name(), reason);
        if let Err(e) = registration.service.close().await {
            owner_warn!(owner, error = %e, "Managed service did not stop cleanly");
        }
    }

    async fn owner_lock(&self, owner: &Owner) -> Arc<Mutex<()>> {
        let mut locks = self.owner_locks.lock().await;
        locks.entry(owner.clone()).or_default().clone()
    }

    fn key_hash(&self, key: &ComparableKey) -> DevServicesResult<u64> {
        key.structural_hash(&self.comparator)
            .map_err(|source| comparison_error(key.owner(), source))
    }
}

fn comparison_error(owner: &Owner, source: shared::ConfigError) -> DevServicesError {
    DevServicesError::Comparison {
        owner: owner.to_string(),
        source,
    }
}
