//! Configuration groups compared when deciding whether a managed service can be reused

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::{
    AccessorDescriptor, AccessorError, ConfigComparator, ConfigGroup, ConfigValue, ShapeDescriptor, ShapeRegistry,
};

pub const DEVSERVICES_SHAPE: &str = "devservices";
pub const SERVICE_SHAPE: &str = "service";

fn default_enabled() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_config_name() -> String {
    "default".to_string()
}

/// Global managed-service settings, shared by every feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevServicesConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DevServicesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl DevServicesConfig {
    pub fn to_value(&self) -> ConfigValue {
        ConfigValue::group(self.clone())
    }
}

impl ConfigGroup for DevServicesConfig {
    fn shape_name(&self) -> &str {
        DEVSERVICES_SHAPE
    }

    fn get(&self, accessor: &str) -> Result<Option<ConfigValue>, AccessorError> {
        match accessor {
            "enabled" => Ok(Some(self.enabled.into())),
            "timeout" => i64::try_from(self.timeout_secs)
                .map(|secs| Some(ConfigValue::Int(secs)))
                .map_err(|e| AccessorError::Failed(e.to_string())),
            _ => Err(AccessorError::Unknown),
        }
    }
}

/// Settings of one feature's managed service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Settings the service contributes to the application under test
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Name of the configuration the service belongs to; part of its owner
    #[serde(default = "default_config_name")]
    pub config_name: String,
    /// Free text, never part of the comparison
    #[serde(default)]
    pub description: Option<String>,
}

impl ServiceConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            settings: BTreeMap::new(),
            port: None,
            config_name: default_config_name(),
            description: None,
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

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn to_value(&self) -> ConfigValue {
        ConfigValue::group(self.clone())
    }
}

impl ConfigGroup for ServiceConfig {
    fn shape_name(&self) -> &str {
        SERVICE_SHAPE
    }

    fn get(&self, accessor: &str) -> Result<Option<ConfigValue>, AccessorError> {
        let value = match accessor {
            "program" => Some(self.program.as_str().into()),
            "args" => Some(self.args.clone().into()),
            "env" => Some(self.env.clone().into()),
            "settings" => Some(self.settings.clone().into()),
            "port" => self.port.map(ConfigValue::from),
            "description" => self.description.as_deref().map(ConfigValue::from),
            _ => return Err(AccessorError::Unknown),
        };
        Ok(value)
    }
}

/// Descriptor tables for every configuration group the tester compares
pub fn shape_registry() -> ShapeRegistry {
    ShapeRegistry::new()
        .with_shape(ShapeDescriptor::mapping(DEVSERVICES_SHAPE).accessor("enabled").accessor("timeout"))
        .with_shape(
            ShapeDescriptor::mapping(SERVICE_SHAPE)
                .accessor("program")
                .accessor("args")
                .accessor("env")
                .accessor("settings")
                .accessor("port")
                .with(AccessorDescriptor::new("description").incidental()),
        )
}

pub fn comparator() -> ConfigComparator {
    ConfigComparator::new(Arc::new(shape_registry()))
}
