//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::SharedError;

/// Profile identity used when a test runs without a profile
pub const NO_PROFILE: &str = "no-profile";

/// Mode the application under test is launched in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    Normal,
    Development,
    #[default]
    Test,
}

impl LaunchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchMode::Normal => "NORMAL",
            LaunchMode::Development => "DEVELOPMENT",
            LaunchMode::Test => "TEST",
        }
    }
}

impl fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaunchMode {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" | "prod" => Ok(LaunchMode::Normal),
            "dev" | "development" => Ok(LaunchMode::Development),
            "test" => Ok(LaunchMode::Test),
            _ => Err(SharedError::InvalidLaunchMode {
                input: s.to_string(),
            }),
        }
    }
}

/// Identifies who may legitimately stop a managed service.
///
/// A feature started in one launch mode under one configuration section never
/// stops services belonging to another owner.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub feature: String,
    pub launch_mode: LaunchMode,
    pub config_name: String,
}

impl Owner {
    pub fn new(feature: impl Into<String>, launch_mode: LaunchMode, config_name: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            launch_mode,
            config_name: config_name.into(),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.feature, self.launch_mode, self.config_name)
    }
}
