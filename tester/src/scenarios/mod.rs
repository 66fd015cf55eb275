//! Suite Runner
//!
//! Runs the tests of a plan against cached runtime contexts. Tests are grouped
//! by cache key so every group shares one context; groups run one after the
//! other and the tests inside a group run with bounded parallelism.

pub mod report;

pub use report::{SuiteReport, TestOutcome, TestStatus};

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::{SuitePlan, TestSpec};
use crate::runtime::{CacheKey, ContextCache};
use devservices::ServiceRegistry;

/// Bytes of stderr kept in a failed outcome
const STDERR_TAIL: usize = 2048;

pub struct SuiteRunner {
    plan: Arc<SuitePlan>,
    cache: Arc<ContextCache>,
    registry: Arc<ServiceRegistry>,
    parallelism: usize,
}

impl SuiteRunner {
    pub fn new(plan: Arc<SuitePlan>, cache: Arc<ContextCache>, registry: Arc<ServiceRegistry>) -> Self {
        Self {
            plan,
            cache,
            registry,
            parallelism: 1,
        }
    }

    /// Maximum number of tests running at once inside one context group
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Tests grouped by cache key, in order of first appearance
    pub fn groups(&self) -> Vec<(CacheKey, Vec<TestSpec>)> {
        let mut order: Vec<CacheKey> = Vec::new();
        let mut groups: HashMap<CacheKey, Vec<TestSpec>> = HashMap::new();
        for test in &self.plan.tests {
            let profile = test.profile.as_deref().and_then(|name| self.plan.profile(name));
            let key = CacheKey::derive(&test.test_class(), profile);
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(test.clone());
        }
        order
            .into_iter()
            .filter_map(|key| groups.remove(&key).map(|tests| (key, tests)))
            .collect()
    }

    pub async fn run(&self) -> SuiteReport {
        let started_at = Utc::now();
        let groups = self.groups();
        info!(tests = self.plan.tests.len(), groups = groups.len(), parallelism = self.parallelism, "🧪 Running suite");

        let mut outcomes = Vec::with_capacity(self.plan.tests.len());
        for (key, tests) in groups {
            debug!(%key, tests = tests.len(), "Running context group");
            outcomes.extend(self.run_group(tests).await);
        }

        let report = SuiteReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
            cache: self.cache.stats(),
            services: self.registry.diagnostics().await,
        };
        info!(
            passed = report.count(TestStatus::Passed),
            failed = report.count(TestStatus::Failed),
            errored = report.count(TestStatus::Errored),
            "🏁 Suite finished"
        );
        report
    }

    async fn run_group(&self, tests: Vec<TestSpec>) -> Vec<TestOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut handles = Vec::with_capacity(tests.len());

        for test in tests {
            let semaphore = semaphore.clone();
            let plan = self.plan.clone();
            let cache = self.cache.clone();
            let class = test.class.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                run_test(&plan, &cache, &test).await
            });
            handles.push((class, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (class, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(class = %class, error = %e, "Test task did not complete");
                    outcomes.push(TestOutcome {
                        class,
                        profile: String::new(),
                        context: None,
                        status: TestStatus::Errored,
                        exit_code: None,
                        message: Some(e.to_string()),
                        duration_ms: 0,
                    });
                }
            }
        }
        outcomes
    }
}

async fn run_test(plan: &SuitePlan, cache: &ContextCache, test: &TestSpec) -> TestOutcome {
    let started = Instant::now();
    let profile = test.profile.as_deref().and_then(|name| plan.profile(name));
    let class = test.test_class();

    let mut outcome = TestOutcome {
        class: test.class.clone(),
        profile: CacheKey::derive(&class, profile).profile,
        context: None,
        status: TestStatus::Errored,
        exit_code: None,
        message: None,
        duration_ms: 0,
    };

    let context = match cache.get_context(&class, profile).await {
        Ok(context) => context,
        Err(e) => {
            warn!(class = %test.class, error = %e, "❌ No runtime context for test");
            outcome.message = Some(e.to_string());
            outcome.duration_ms = started.elapsed().as_millis() as u64;
            return outcome;
        }
    };
    outcome.context = Some(context.id());

    let result = Command::new(&test.command.program)
        .args(&test.command.args)
        .envs(context.settings())
        .envs(&test.command.env)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(output) if output.status.success() => {
            outcome.status = TestStatus::Passed;
            outcome.exit_code = output.status.code();
        }
        Ok(output) => {
            outcome.status = TestStatus::Failed;
            outcome.exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail_start = stderr.len().saturating_sub(STDERR_TAIL);
            let tail = stderr.get(tail_start..).unwrap_or(&stderr).trim();
            if !tail.is_empty() {
                outcome.message = Some(tail.to_string());
            }
        }
        Err(e) => {
            outcome.message = Some(format!("{}: {e}", test.command.command_line()));
        }
    }

    outcome.duration_ms = started.elapsed().as_millis() as u64;
    let icon = if outcome.status == TestStatus::Passed { "✅" } else { "❌" };
    info!(class = %outcome.class, status = ?outcome.status, duration_ms = outcome.duration_ms, "{icon} Test finished");
    outcome
}
