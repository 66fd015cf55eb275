//! Managed-service error types

use shared::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevServicesError {
    #[error("Failed to start managed service for {owner}: {message}")]
    ServiceStart { owner: String, message: String },

    #[error("Failed to stop managed service {service}: {message}")]
    ServiceStop { service: String, message: String },

    #[error("Configuration comparison failed for {owner}")]
    Comparison {
        owner: String,
        #[source]
        source: ConfigError,
    },

    #[error("Service registry is shut down")]
    RegistryClosed,

    #[error("Process spawn failed: {command}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

pub type DevServicesResult<T> = Result<T, DevServicesError>;
