//! Shared fixtures for tester integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tester::{BootstrapError, BuildRequest, ContextBuilder, ContextHandle, RuntimeContext};

/// Handle that counts releases and exposes fixed settings
pub struct CountingHandle {
    releases: Arc<AtomicUsize>,
    settings: HashMap<String, String>,
    release_delay: Duration,
}

#[async_trait::async_trait]
impl ContextHandle for CountingHandle {
    fn settings(&self) -> HashMap<String, String> {
        self.settings.clone()
    }

    async fn release(&self) -> anyhow::Result<()> {
        if !self.release_delay.is_zero() {
            tokio::time::sleep(self.release_delay).await;
        }
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone)]
enum Behaviour {
    Succeed,
    /// Fail every build up to and including the given build number
    Fail(BootstrapError, usize),
    Panic,
}

/// Builder that counts builds and releases, optionally slow or failing
#[derive(Clone)]
pub struct CountingBuilder {
    builds: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    delay: Duration,
    release_delay: Duration,
    behaviour: Behaviour,
    settings: HashMap<String, String>,
}

impl CountingBuilder {
    pub fn new() -> Self {
        Self {
            builds: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            release_delay: Duration::ZERO,
            behaviour: Behaviour::Succeed,
            settings: HashMap::new(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_release_delay(mut self, delay: Duration) -> Self {
        self.release_delay = delay;
        self
    }

    pub fn failing(self, message: &str) -> Self {
        self.failing_first(usize::MAX, message)
    }

    pub fn failing_first(mut self, builds: usize, message: &str) -> Self {
        let error = BootstrapError::BuildFailed {
            test_class: "any".to_string(),
            message: message.to_string(),
        };
        self.behaviour = Behaviour::Fail(error, builds);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behaviour = Behaviour::Panic;
        self
    }

    pub fn with_setting(mut self, key: &str, value: &str) -> Self {
        self.settings.insert(key.to_string(), value.to_string());
        self
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn into_shared(self) -> Arc<dyn ContextBuilder> {
        Arc::new(self)
    }
}

impl Default for CountingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ContextBuilder for CountingBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<RuntimeContext, BootstrapError> {
        let build = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behaviour {
            Behaviour::Fail(error, until) if build <= *until => Err(error.clone()),
            Behaviour::Panic => panic!("builder exploded"),
            _ => Ok(RuntimeContext::new(
                request,
                CountingHandle {
                    releases: self.releases.clone(),
                    settings: self.settings.clone(),
                    release_delay: self.release_delay,
                },
            )),
        }
    }
}
