//! Shared logging utilities for consistent tracing across the workspace

use chrono::{DateTime, Utc};
use tracing::info;

use crate::types::Owner;

/// Crates whose events pass the filter at the configured level
const WORKSPACE_TARGETS: &[&str] = &["tester", "devservices", "shared"];

/// Build the env-filter directive string for a base level
pub fn filter_directives(base_level: &str) -> String {
    WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{target}={base_level}"))
        .chain(std::iter::once("warn".to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the stdout tracing subscriber
///
/// `RUST_LOG` takes precedence over the supplied level when set.
pub fn init_tracing(log_level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let base_level = log_level.unwrap_or("info");
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(base_level)));

    // try_init so repeated initialisation from tests is harmless
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for owner-aware info logging
#[macro_export]
macro_rules! owner_info {
    ($owner:expr, $($arg:tt)*) => {
        tracing::info!(
            owner = %$owner,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for owner-aware warning logging
#[macro_export]
macro_rules! owner_warn {
    ($owner:expr, $($arg:tt)*) => {
        tracing::warn!(
            owner = %$owner,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for owner-aware debug logging
#[macro_export]
macro_rules! owner_debug {
    ($owner:expr, $($arg:tt)*) => {
        tracing::debug!(
            owner = %$owner,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper, called once a service is up
pub fn log_service_started(owner: &Owner, service: &str) {
    info!(
        owner = %owner,
        timestamp = format_timestamp(),
        "🚀 Started managed service {}",
        service
    );
}

/// Contextual logging helper for service stop messages
pub fn log_service_stop(owner: &Owner, service: &str, reason: &str) {
    info!(
        owner = %owner,
        timestamp = format_timestamp(),
        "🛑 Stopping managed service {}: {}",
        service,
        reason
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_cover_workspace_crates() {
        let directives = filter_directives("debug");
        assert_eq!(directives, "tester=debug,devservices=debug,shared=debug,warn");
    }

    #[test]
    fn test_timestamp_format() {
        let ts = format_timestamp();
        // HH:MM:SS.mmm
        assert_eq!(ts.len(), 12);
        assert_eq!(&ts[2..3], ":");
        assert_eq!(&ts[8..9], ".");
    }
}
