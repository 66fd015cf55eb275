//! Process-backed context builder
//!
//! Requests the managed services a profile needs through the registry, merges
//! their settings with the profile's own, and optionally launches the
//! application under test with those settings as its environment.

use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::context::{BuildRequest, ContextBuilder, ContextHandle, RuntimeContext};
use crate::config::{CommandSpec, DevServicesConfig, ServiceConfig, SuitePlan};
use crate::error::BootstrapError;
use devservices::{start_process_service, ManagedService, PortAllocator, ProcessServiceSpec, ServiceRegistry};
use shared::{LaunchMode, Owner};

/// Setting holding the profile identity of the context
pub const PROFILE_SETTING: &str = "test.profile";

pub struct ProcessContextBuilder {
    registry: Arc<ServiceRegistry>,
    launch_mode: LaunchMode,
    devservices: DevServicesConfig,
    application: Option<CommandSpec>,
    ports: PortAllocator,
}

impl ProcessContextBuilder {
    pub fn new(registry: Arc<ServiceRegistry>, launch_mode: LaunchMode, devservices: DevServicesConfig) -> Self {
        Self {
            registry,
            launch_mode,
            devservices,
            application: None,
            ports: PortAllocator::default(),
        }
    }

    pub fn from_plan(registry: Arc<ServiceRegistry>, plan: &SuitePlan) -> Self {
        let builder = Self::new(registry, plan.launch_mode, plan.devservices.clone());
        match &plan.application {
            Some(application) => builder.with_application(application.clone()),
            None => builder,
        }
    }

    pub fn with_application(mut self, application: CommandSpec) -> Self {
        self.application = Some(application);
        self
    }

    pub fn with_port_allocator(mut self, ports: PortAllocator) -> Self {
        self.ports = ports;
        self
    }

    async fn request_service(&self, feature: &str, config: &ServiceConfig) -> Result<Arc<ManagedService>, BootstrapError> {
        let owner = Owner::new(feature, self.launch_mode, config.config_name.clone());
        let timeout = Duration::from_secs(self.devservices.timeout_secs);

        let service = self
            .registry
            .request_service(
                owner,
                Some(self.devservices.to_value()),
                Some(config.to_value()),
                || async move {
                    let port = match config.port {
                        Some(port) => port,
                        None => self.ports.next_port().await,
                    };
                    let mut spec = ProcessServiceSpec::new(feature, config.program.clone())
                        .with_args(config.args.iter().cloned())
                        .with_port(port);
                    for (key, value) in &config.env {
                        spec = spec.with_env(key.clone(), value.clone());
                    }
                    for (key, value) in &config.settings {
                        spec = spec.with_setting(key.clone(), value.clone());
                    }

                    match tokio::time::timeout(timeout, start_process_service(&spec)).await {
                        Ok(started) => started.map_err(anyhow::Error::from),
                        Err(_) => Err(anyhow::anyhow!(
                            "{} did not start within {}s",
                            spec.command_line(),
                            timeout.as_secs()
                        )),
                    }
                },
            )
            .await?;
        Ok(service)
    }

    fn launch_application(command: &CommandSpec, env: &HashMap<String, String>) -> Result<Child, BootstrapError> {
        info!(command = %command.command_line(), "🚀 Launching application under test");
        Command::new(&command.program)
            .args(&command.args)
            .envs(env)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BootstrapError::LaunchFailed {
                message: format!("{}: {e}", command.command_line()),
            })
    }
}

#[async_trait::async_trait]
impl ContextBuilder for ProcessContextBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<RuntimeContext, BootstrapError> {
        let key = request.key();
        let mut settings = BTreeMap::from([(PROFILE_SETTING.to_string(), key.profile.clone())]);
        let mut services = Vec::new();

        if let Some(profile) = &request.profile {
            settings.extend(profile.settings.clone());

            if self.devservices.enabled {
                for (feature, config) in &profile.services {
                    let service = self.request_service(feature, config).await?;
                    debug!(feature = %feature, service = %service.name(), "Managed service attached to context");
                    services.push(service);
                }
            } else if !profile.services.is_empty() {
                warn!(profile = %profile.name, "Managed services are disabled, skipping");
            }
        }

        let handle = ProcessContext {
            settings,
            services,
            application: Mutex::new(None),
        };
        if let Some(command) = &self.application {
            let child = Self::launch_application(command, &handle.settings())?;
            *handle.application.lock().await = Some(child);
        }

        Ok(RuntimeContext::new(request, handle))
    }
}

/// Context whose runtime is an optional application process
struct ProcessContext {
    settings: BTreeMap<String, String>,
    services: Vec<Arc<ManagedService>>,
    application: Mutex<Option<Child>>,
}

#[async_trait::async_trait]
impl ContextHandle for ProcessContext {
    fn settings(&self) -> HashMap<String, String> {
        let mut merged: HashMap<String, String> = self.settings.clone().into_iter().collect();
        for service in &self.services {
            merged.extend(service.dynamic_settings());
        }
        merged
    }

    async fn release(&self) -> anyhow::Result<()> {
        let Some(mut child) = self.application.lock().await.take() else {
            return Ok(());
        };
        info!(pid = ?child.id(), "🛑 Stopping application under test");
        child.kill().await?;
        Ok(())
    }
}
