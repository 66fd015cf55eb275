//! Shared error types for the test runtime workspace

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid launch mode: {input}")]
    InvalidLaunchMode { input: String },
}

/// Failure raised by a configuration value while one of its accessors is read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessorError {
    #[error("no such accessor")]
    Unknown,

    #[error("{0}")]
    Failed(String),
}

/// Errors from structural comparison and hashing of configuration values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Accessor {shape}.{accessor} failed: {message}")]
    AccessorFailed {
        shape: String,
        accessor: String,
        message: String,
    },

    #[error("Value of shape {shape} does not expose accessor {accessor}")]
    ShapeMismatch { shape: String, accessor: String },

    #[error("Configuration shape {shape} is not registered")]
    UnknownShape { shape: String },

    #[error("Shape {shape} is not a mapping or group and cannot be compared")]
    UnrecognizedShape { shape: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
