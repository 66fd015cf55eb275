//! Process-backed managed services
//!
//! Starts a managed dependency as a child process and stops it with SIGTERM,
//! falling back to a kill when it does not exit within the grace period.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::error::{DevServicesError, DevServicesResult};
use crate::lifecycle::{ManagedService, ServiceHandle};

/// Default time a process gets to exit after SIGTERM
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// What to run for a process-backed service
#[derive(Debug, Clone)]
pub struct ProcessServiceSpec {
    /// Feature name, used as the prefix of the exposed settings
    pub feature: String,
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub settings: BTreeMap<String, String>,
    pub port: Option<u16>,
    pub grace_period: Duration,
}

impl ProcessServiceSpec {
    pub fn new(feature: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            settings: BTreeMap::new(),
            port: None,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Hands out ports for services that need one
pub struct PortAllocator {
    next_port: Mutex<u16>,
}

impl PortAllocator {
    pub fn new(base_port: u16) -> Self {
        Self {
            next_port: Mutex::new(base_port),
        }
    }

    pub async fn next_port(&self) -> u16 {
        let mut port = self.next_port.lock().await;
        let current = *port;
        *port = port.wrapping_add(1);
        current
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        // Start ports from 9000 to avoid conflicts
        Self::new(9000)
    }
}

/// Release handle for a child process
pub struct ProcessHandle {
    child: Mutex<Option<Child>>,
    pid: Arc<AtomicU32>,
    grace_period: Duration,
}

impl ProcessHandle {
    fn new(child: Child, grace_period: Duration) -> Self {
        let pid = Arc::new(AtomicU32::new(child.id().unwrap_or_default()));
        Self {
            child: Mutex::new(Some(child)),
            pid,
            grace_period,
        }
    }

    #[cfg(unix)]
    fn terminate_gracefully(pid: u32) -> anyhow::Result<()> {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(anyhow::anyhow!("failed to send SIGTERM to {pid}: {e}")),
        }
    }

    #[cfg(not(unix))]
    fn terminate_gracefully(_pid: u32) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl ServiceHandle for ProcessHandle {
    async fn stop(&self) -> anyhow::Result<()> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        let pid = self.pid.swap(0, Ordering::AcqRel);

        if pid != 0 {
            if let Err(e) = Self::terminate_gracefully(pid) {
                tracing::warn!(pid, error = %e, "⚠️ Failed to terminate gracefully");
            }
        }

        match tokio::time::timeout(self.grace_period, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(pid, %status, "Process exited");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                tracing::warn!(pid, "🔨 Process ignored SIGTERM, killing");
                child.kill().await?;
                Ok(())
            }
        }
    }
}

/// Spawn the process described by `spec` and wrap it as a managed service.
///
/// Exposes `<feature>.pid` as a lazy setting and `<feature>.port` when a
/// port is configured.
pub async fn start_process_service(spec: &ProcessServiceSpec) -> DevServicesResult<ManagedService> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    if let Some(port) = spec.port {
        cmd.env("PORT", port.to_string());
    }

    let child = cmd.spawn().map_err(|source| DevServicesError::SpawnFailed {
        command: spec.command_line(),
        source,
    })?;

    let handle = ProcessHandle::new(child, spec.grace_period);
    let pid = handle.pid.clone();
    let container_id = pid.load(Ordering::Acquire).to_string();
    tracing::debug!(feature = %spec.feature, pid = %container_id, "Spawned service process");

    let mut service = ManagedService::new(spec.feature.clone(), handle)
        .with_description(spec.command_line())
        .with_container_id(container_id)
        .with_lazy_setting(format!("{}.pid", spec.feature), move || {
            pid.load(Ordering::Acquire).to_string()
        });
    for (key, value) in &spec.settings {
        service = service.with_setting(key.clone(), value.clone());
    }
    if let Some(port) = spec.port {
        service = service.with_setting(format!("{}.port", spec.feature), port.to_string());
    }
    Ok(service)
}
