//! Test Runner
//!
//! Runs a JSON suite plan:
//! - loads and validates the plan
//! - builds runtime contexts on demand and reuses them across test classes
//! - starts managed services and reuses them while their settings match
//! - writes a JSON report and exits non-zero when any test did not pass

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time::timeout;

use devservices::ServiceRegistry;
use shared::logging;
use tester::config::settings;
use tester::{ContextCache, ProcessContextBuilder, SuitePlan, SuiteRunner, TestStatus};

#[derive(Parser)]
#[command(name = "tester")]
#[command(about = "Runs test classes against cached runtime contexts and managed services")]
struct Args {
    /// Suite plan (JSON)
    #[arg(long)]
    plan: PathBuf,

    /// Tests running at once inside one context
    #[arg(long, default_value = "1")]
    parallelism: usize,

    /// Suite timeout in seconds
    #[arg(long, default_value = "600")]
    timeout_secs: u64,

    /// Write the JSON report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { args.log_level.as_str() };
    logging::init_tracing(Some(level));

    let plan = SuitePlan::load(&args.plan).with_context(|| format!("loading plan {}", args.plan.display()))?;
    let plan = Arc::new(plan);
    tracing::info!(
        plan = %args.plan.display(),
        tests = plan.tests.len(),
        profiles = plan.profiles.len(),
        launch_mode = %plan.launch_mode,
        "🧪 Starting test run"
    );

    let registry = Arc::new(ServiceRegistry::new(settings::comparator()));
    let builder = ProcessContextBuilder::from_plan(registry.clone(), &plan);
    let cache = Arc::new(ContextCache::new(Arc::new(builder)));
    let runner = SuiteRunner::new(plan, cache.clone(), registry.clone()).with_parallelism(args.parallelism);

    let result = timeout(Duration::from_secs(args.timeout_secs), runner.run()).await;

    tracing::info!("🛑 Releasing runtime contexts and managed services");
    cache.close().await;
    registry.shutdown().await;

    let report = match result {
        Ok(report) => report,
        Err(_) => {
            tracing::error!("⏰ Suite timed out after {}s", args.timeout_secs);
            anyhow::bail!("suite timed out after {}s", args.timeout_secs);
        }
    };

    if let Some(path) = &args.report {
        std::fs::write(path, report.to_json()?).with_context(|| format!("writing report {}", path.display()))?;
        tracing::info!(report = %path.display(), "Report written");
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} failed, {} errored of {} tests",
            report.count(TestStatus::Failed),
            report.count(TestStatus::Errored),
            report.outcomes.len()
        );
    }

    tracing::info!("🏁 All {} tests passed", report.outcomes.len());
    Ok(())
}
