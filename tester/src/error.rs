//! Tester-specific error types

use devservices::DevServicesError;
use thiserror::Error;

/// Failure to build a runtime context
///
/// Cloneable so one failed build can be delivered to every waiter and
/// replayed to the next request for the same key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("Managed service unavailable for {owner}: {message}")]
    ServiceUnavailable { owner: String, message: String },

    #[error("Failed to launch application: {message}")]
    LaunchFailed { message: String },

    #[error("Context build for {test_class} failed: {message}")]
    BuildFailed { test_class: String, message: String },

    #[error("Context build for {test_class} panicked")]
    BuildPanicked { test_class: String },
}

impl From<DevServicesError> for BootstrapError {
    fn from(error: DevServicesError) -> Self {
        match error {
            DevServicesError::ServiceStart { owner, message } => {
                BootstrapError::ServiceUnavailable { owner, message }
            }
            DevServicesError::Comparison { owner, source } => BootstrapError::ServiceUnavailable {
                owner,
                message: source.to_string(),
            },
            other => BootstrapError::LaunchFailed {
                message: other.to_string(),
            },
        }
    }
}

/// Errors surfaced by the runtime context cache
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("Build for {key} was abandoned before completing")]
    BuildAbandoned { key: String },

    #[error("No build request recorded for {key}")]
    NotRecorded { key: String },

    #[error("Build for {key} was superseded by a request for another key")]
    Superseded { key: String },

    #[error("Context cache is closed")]
    Closed,
}

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum TesterError {
    #[error("Invalid test plan: {message}")]
    InvalidPlan { message: String },

    #[error("Unknown profile {profile} referenced by {test_class}")]
    UnknownProfile { profile: String, test_class: String },

    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type TesterResult<T> = Result<T, TesterError>;
