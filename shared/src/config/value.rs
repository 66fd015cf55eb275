//! Configuration values and the group seam shared across isolation domains

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::AccessorError;

/// A configuration group as seen from outside its isolation domain.
///
/// Implementations from different domains only agree on the logical shape
/// name and on the accessor names registered for that shape.
pub trait ConfigGroup: Send + Sync {
    /// Logical shape name, shared by every implementation of the shape
    fn shape_name(&self) -> &str;

    /// Read one accessor. `Ok(None)` is an unset (null) value.
    fn get(&self, accessor: &str) -> Result<Option<ConfigValue>, AccessorError>;
}

/// A single configuration value
#[derive(Clone)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
    Group(Arc<dyn ConfigGroup>),
}

impl ConfigValue {
    /// Wrap a group implementation
    pub fn group<G: ConfigGroup + 'static>(group: G) -> Self {
        ConfigValue::Group(Arc::new(group))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short variant name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Int(_) => "int",
            ConfigValue::Float(_) => "float",
            ConfigValue::Str(_) => "string",
            ConfigValue::List(_) => "list",
            ConfigValue::Map(_) => "map",
            ConfigValue::Group(_) => "group",
        }
    }
}

impl fmt::Debug for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(v) => write!(f, "{v}"),
            ConfigValue::Int(v) => write!(f, "{v}"),
            ConfigValue::Float(v) => write!(f, "{v}"),
            ConfigValue::Str(v) => write!(f, "{v:?}"),
            ConfigValue::List(items) => f.debug_list().entries(items).finish(),
            ConfigValue::Map(entries) => f.debug_map().entries(entries).finish(),
            ConfigValue::Group(group) => write!(f, "<{}>", group.shape_name()),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Int(value.into())
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<u16> for ConfigValue {
    fn from(value: u16) -> Self {
        ConfigValue::Int(value.into())
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

impl<T: Into<ConfigValue>> From<Vec<T>> for ConfigValue {
    fn from(values: Vec<T>) -> Self {
        ConfigValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<ConfigValue>> From<BTreeMap<String, V>> for ConfigValue {
    fn from(entries: BTreeMap<String, V>) -> Self {
        ConfigValue::Map(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Map-backed group, the generic implementation of any shape
#[derive(Clone, Debug)]
pub struct SimpleGroup {
    shape: String,
    values: BTreeMap<String, Option<ConfigValue>>,
}

impl SimpleGroup {
    pub fn new(shape: impl Into<String>) -> Self {
        Self {
            shape: shape.into(),
            values: BTreeMap::new(),
        }
    }

    /// Set an accessor value (fluent API)
    pub fn with(mut self, accessor: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.values.insert(accessor.into(), Some(value.into()));
        self
    }

    /// Declare an accessor that answers with null (fluent API)
    pub fn with_unset(mut self, accessor: impl Into<String>) -> Self {
        self.values.insert(accessor.into(), None);
        self
    }
}

impl ConfigGroup for SimpleGroup {
    fn shape_name(&self) -> &str {
        &self.shape
    }

    fn get(&self, accessor: &str) -> Result<Option<ConfigValue>, AccessorError> {
        self.values.get(accessor).cloned().ok_or(AccessorError::Unknown)
    }
}
