//! Runtime context cache
//!
//! Maps a [`CacheKey`] to the runtime context built for it and decides, for
//! every test, whether the cached context can be reused:
//!
//! - a failure recorded for the key is replayed once, then the key is clear;
//! - contexts cached under any other key are evicted and released first,
//!   outside the cache lock;
//! - a cached context for the key is reused;
//! - a build already running for the key is joined;
//! - otherwise a new build starts.
//!
//! Builds run on their own task. Every caller asking for a key while its
//! build runs subscribes to the same broadcast and observes the same outcome,
//! and a caller giving up never strands the others. A build finishing after
//! another key was requested is released instead of cached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use super::context::{BuildRequest, ContextBuilder, RuntimeContext};
use super::key::CacheKey;
use crate::config::{Profile, TestClass};
use crate::error::{BootstrapError, CacheError, CacheResult};

type BuildOutcome = Result<Arc<RuntimeContext>, CacheError>;

/// Observable lifecycle position of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContextState {
    Absent,
    Building,
    Ready,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, Arc<RuntimeContext>>,
    requests: HashMap<CacheKey, BuildRequest>,
    in_flight: HashMap<CacheKey, broadcast::Sender<BuildOutcome>>,
    failures: HashMap<CacheKey, BootstrapError>,
    current: Option<CacheKey>,
    closed: bool,
}

#[derive(Default)]
struct CacheCounters {
    requests: AtomicU64,
    builds: AtomicU64,
    reuses: AtomicU64,
    coalesced: AtomicU64,
    invalidations: AtomicU64,
    failures: AtomicU64,
}

/// Snapshot of the cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub requests: u64,
    pub builds: u64,
    pub reuses: u64,
    pub coalesced: u64,
    pub invalidations: u64,
    pub failures: u64,
}

impl CacheStats {
    /// Share of requests served without starting a build
    pub fn reuse_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            (self.reuses + self.coalesced) as f64 / self.requests as f64
        }
    }
}

enum Plan {
    Ready(Arc<RuntimeContext>),
    Wait(broadcast::Receiver<BuildOutcome>),
}

pub struct ContextCache {
    builder: Arc<dyn ContextBuilder>,
    state: Arc<Mutex<CacheState>>,
    counters: Arc<CacheCounters>,
}

impl ContextCache {
    pub fn new(builder: Arc<dyn ContextBuilder>) -> Self {
        Self {
            builder,
            state: Arc::new(Mutex::new(CacheState::default())),
            counters: Arc::new(CacheCounters::default()),
        }
    }

    /// Context for a test class, reused when its key matches the cached one
    pub async fn get_context(&self, test_class: &TestClass, profile: Option<&Profile>) -> CacheResult<Arc<RuntimeContext>> {
        self.get_for(BuildRequest::new(test_class.clone(), profile.cloned())).await
    }

    async fn get_for(&self, request: BuildRequest) -> CacheResult<Arc<RuntimeContext>> {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        let key = request.key();

        // Stale contexts are released outside the lock, then the request is
        // re-examined since the state may have moved on meanwhile
        let plan = loop {
            let evicted = {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Err(CacheError::Closed);
                }

                if let Some(error) = state.failures.remove(&key) {
                    debug!(%key, error = %error, "Replaying recorded bootstrap failure");
                    return Err(CacheError::Bootstrap(error));
                }

                state.current = Some(key.clone());
                let evicted = self.take_stale(&mut state, &key);
                if evicted.is_empty() {
                    break self.plan_for(&mut state, key.clone(), request);
                }
                evicted
            };
            release_all(&evicted).await;
        };

        match plan {
            Plan::Ready(context) => Ok(context),
            Plan::Wait(mut receiver) => match receiver.recv().await {
                Ok(outcome) => outcome,
                Err(_) => Err(CacheError::BuildAbandoned { key: key.to_string() }),
            },
        }
    }

    /// Remove every context cached under a key other than `key`
    fn take_stale(&self, state: &mut CacheState, key: &CacheKey) -> Vec<Arc<RuntimeContext>> {
        let stale: Vec<CacheKey> = state.entries.keys().filter(|k| *k != key).cloned().collect();
        let mut evicted = Vec::with_capacity(stale.len());
        for stale_key in stale {
            if let Some(context) = state.entries.remove(&stale_key) {
                self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
                info!(from = %stale_key, to = %key, "🔄 Runtime context key changed, releasing");
                evicted.push(context);
            }
        }
        evicted
    }

    fn plan_for(&self, state: &mut CacheState, key: CacheKey, request: BuildRequest) -> Plan {
        if let Some(context) = state.entries.get(&key) {
            self.counters.reuses.fetch_add(1, Ordering::Relaxed);
            debug!(%key, context = %context.id(), "Reusing runtime context");
            Plan::Ready(context.clone())
        } else if let Some(sender) = state.in_flight.get(&key) {
            self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!(%key, "Joining in-flight context build");
            Plan::Wait(sender.subscribe())
        } else {
            let (sender, receiver) = broadcast::channel(1);
            state.in_flight.insert(key.clone(), sender);
            self.counters.builds.fetch_add(1, Ordering::Relaxed);
            self.spawn_build(key, request);
            Plan::Wait(receiver)
        }
    }

    fn spawn_build(&self, key: CacheKey, request: BuildRequest) {
        let builder = self.builder.clone();
        let state = self.state.clone();
        let counters = self.counters.clone();

        tokio::spawn(async move {
            info!(%key, test_class = %request.test_class.name, "🚀 Building runtime context");
            let result = run_build(builder, request.clone()).await;

            let mut guard = state.lock().await;
            let sender = guard.in_flight.remove(&key);
            let superseded = matches!(guard.current.as_ref(), Some(current) if *current != key);
            let outcome = match result {
                Ok(context) if guard.closed => {
                    drop(guard);
                    release_context(&context).await;
                    Err(CacheError::Closed)
                }
                Ok(context) if superseded => {
                    // Another key was requested while building; never cache it
                    drop(guard);
                    counters.invalidations.fetch_add(1, Ordering::Relaxed);
                    info!(%key, context = %context.id(), "🔄 Runtime context superseded, releasing");
                    release_context(&context).await;
                    Err(CacheError::Superseded { key: key.to_string() })
                }
                Ok(context) => {
                    let context = Arc::new(context);
                    info!(%key, context = %context.id(), "✅ Runtime context ready");
                    guard.entries.insert(key.clone(), context.clone());
                    guard.requests.insert(key.clone(), request);
                    drop(guard);
                    Ok(context)
                }
                Err(error) => {
                    counters.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(%key, error = %error, "❌ Runtime context build failed");
                    guard.failures.insert(key.clone(), error.clone());
                    drop(guard);
                    Err(CacheError::Bootstrap(error))
                }
            };

            if let Some(sender) = sender {
                // No receivers left means every waiter gave up; the outcome stays recorded
                let _ = sender.send(outcome);
            }
        });
    }

    /// Evict and release the context cached under `key`.
    ///
    /// Returns whether a context was evicted.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let context = {
            let mut state = self.state.lock().await;
            let Some(context) = state.entries.remove(key) else {
                return false;
            };
            if state.current.as_ref() == Some(key) {
                state.current = None;
            }
            context
        };
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        info!(%key, context = %context.id(), "Invalidating runtime context");
        release_context(&context).await;
        true
    }

    /// Rebuild the context for `key` from the request it was last built with
    pub async fn refresh(&self, key: &CacheKey) -> CacheResult<Arc<RuntimeContext>> {
        let recorded = self.state.lock().await.requests.get(key).cloned();
        let request = recorded.ok_or_else(|| CacheError::NotRecorded { key: key.to_string() })?;

        self.invalidate(key).await;
        self.get_for(request).await
    }

    pub async fn state_of(&self, key: &CacheKey) -> ContextState {
        let state = self.state.lock().await;
        if state.entries.contains_key(key) {
            ContextState::Ready
        } else if state.in_flight.contains_key(key) {
            ContextState::Building
        } else {
            ContextState::Absent
        }
    }

    /// Key most recently requested
    pub async fn current_key(&self) -> Option<CacheKey> {
        self.state.lock().await.current.clone()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            builds: self.counters.builds.load(Ordering::Relaxed),
            reuses: self.counters.reuses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Release every cached context and refuse further requests.
    ///
    /// Returns the number of contexts released.
    pub async fn close(&self) -> usize {
        let contexts: Vec<Arc<RuntimeContext>> = {
            let mut state = self.state.lock().await;
            state.closed = true;
            state.current = None;
            let drained: Vec<Arc<RuntimeContext>> = state.entries.drain().map(|(_, context)| context).collect();
            drained
        };
        release_all(&contexts).await;
        let stats = self.stats();
        info!(
            released = contexts.len(),
            requests = stats.requests,
            builds = stats.builds,
            reuse_ratio = format!("{:.2}", stats.reuse_ratio()),
            "Context cache closed"
        );
        contexts.len()
    }
}

/// Run one build on its own task so a panicking builder surfaces as an error
async fn run_build(builder: Arc<dyn ContextBuilder>, request: BuildRequest) -> Result<RuntimeContext, BootstrapError> {
    let test_class = request.test_class.name.clone();
    match tokio::spawn(async move { builder.build(&request).await }).await {
        Ok(result) => result,
        Err(join_error) => {
            warn!(test_class = %test_class, error = %join_error, "Context builder did not complete");
            Err(BootstrapError::BuildPanicked { test_class })
        }
    }
}

async fn release_all(contexts: &[Arc<RuntimeContext>]) {
    for context in contexts {
        release_context(context).await;
    }
}

async fn release_context(context: &RuntimeContext) {
    if let Err(e) = context.release().await {
        warn!(context = %context.id(), error = %e, "⚠️ Runtime context did not release cleanly");
    }
}
