//! Structural comparison of configuration values
//!
//! Two values are equal when they report the same logical shape and every
//! configuration accessor registered for that shape yields deeply equal
//! results. Concrete types and instance identity play no part, so values built
//! in different isolation domains compare correctly.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::config::shape::{ShapeDescriptor, ShapeRegistry};
use crate::config::value::{ConfigGroup, ConfigValue};
use crate::errors::{AccessorError, ConfigError, ConfigResult};

/// Hash multiplier used when folding accessor and element hashes
const HASH_MULTIPLIER: u64 = 31;

/// Accessor-driven equality and hashing over a shared shape table
#[derive(Clone, Debug)]
pub struct ConfigComparator {
    shapes: Arc<ShapeRegistry>,
}

impl ConfigComparator {
    pub fn new(shapes: Arc<ShapeRegistry>) -> Self {
        Self { shapes }
    }

    pub fn shapes(&self) -> &ShapeRegistry {
        &self.shapes
    }

    /// Structural equality of two nullable values
    pub fn equal(&self, a: Option<&ConfigValue>, b: Option<&ConfigValue>) -> ConfigResult<bool> {
        match (a, b) {
            (None, None) => Ok(true),
            (Some(a), Some(b)) => self.values_equal(a, b),
            _ => Ok(false),
        }
    }

    /// Structural hash of a nullable value; null hashes to 0
    pub fn hash(&self, value: Option<&ConfigValue>) -> ConfigResult<u64> {
        match value {
            None => Ok(0),
            Some(value) => self.value_hash(value),
        }
    }

    fn values_equal(&self, a: &ConfigValue, b: &ConfigValue) -> ConfigResult<bool> {
        match (a, b) {
            (ConfigValue::Bool(a), ConfigValue::Bool(b)) => Ok(a == b),
            (ConfigValue::Int(a), ConfigValue::Int(b)) => Ok(a == b),
            (ConfigValue::Float(a), ConfigValue::Float(b)) => Ok(a.to_bits() == b.to_bits()),
            (ConfigValue::Str(a), ConfigValue::Str(b)) => Ok(a == b),
            (ConfigValue::List(a), ConfigValue::List(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b) {
                    if !self.values_equal(x, y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (ConfigValue::Map(a), ConfigValue::Map(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for ((ka, va), (kb, vb)) in a.iter().zip(b) {
                    if ka != kb || !self.values_equal(va, vb)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (ConfigValue::Group(a), ConfigValue::Group(b)) => self.groups_equal(a.as_ref(), b.as_ref()),
            _ => Ok(false),
        }
    }

    fn groups_equal(&self, a: &dyn ConfigGroup, b: &dyn ConfigGroup) -> ConfigResult<bool> {
        if std::ptr::addr_eq(a as *const dyn ConfigGroup, b as *const dyn ConfigGroup) {
            return Ok(true);
        }
        if a.shape_name() != b.shape_name() {
            return Ok(false);
        }

        let shape = self.configuration_shape(a.shape_name())?;
        for accessor in shape.configuration_accessors() {
            let left = read_accessor(a, &accessor.name)?;
            let right = read_accessor(b, &accessor.name)?;
            if !self.equal(left.as_ref(), right.as_ref())? {
                tracing::trace!(
                    shape = %shape.name,
                    accessor = %accessor.name,
                    "Configuration values differ"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn value_hash(&self, value: &ConfigValue) -> ConfigResult<u64> {
        match value {
            ConfigValue::Bool(v) => Ok(scalar_hash(v)),
            ConfigValue::Int(v) => Ok(scalar_hash(v)),
            ConfigValue::Float(v) => Ok(scalar_hash(&v.to_bits())),
            ConfigValue::Str(v) => Ok(scalar_hash(v)),
            ConfigValue::List(items) => items
                .iter()
                .try_fold(1u64, |acc, item| -> ConfigResult<u64> {
                    Ok(fold(acc, self.value_hash(item)?))
                }),
            ConfigValue::Map(entries) => entries.iter().try_fold(0u64, |acc, (key, item)| -> ConfigResult<u64> {
                Ok(fold(acc, scalar_hash(key) ^ self.value_hash(item)?))
            }),
            ConfigValue::Group(group) => self.group_hash(group.as_ref()),
        }
    }

    fn group_hash(&self, group: &dyn ConfigGroup) -> ConfigResult<u64> {
        let shape = self.configuration_shape(group.shape_name())?;
        let mut result = 0u64;
        for accessor in shape.configuration_accessors() {
            if let Some(value) = read_accessor(group, &accessor.name)? {
                result = fold(result, self.value_hash(&value)?);
            }
        }
        Ok(result)
    }

    fn configuration_shape(&self, name: &str) -> ConfigResult<&ShapeDescriptor> {
        let shape = self.shapes.get(name).ok_or_else(|| ConfigError::UnknownShape {
            shape: name.to_string(),
        })?;
        if !shape.kind.is_configuration() {
            return Err(ConfigError::UnrecognizedShape {
                shape: name.to_string(),
            });
        }
        Ok(shape)
    }
}

fn read_accessor(group: &dyn ConfigGroup, accessor: &str) -> ConfigResult<Option<ConfigValue>> {
    group.get(accessor).map_err(|e| match e {
        AccessorError::Unknown => ConfigError::ShapeMismatch {
            shape: group.shape_name().to_string(),
            accessor: accessor.to_string(),
        },
        AccessorError::Failed(message) => ConfigError::AccessorFailed {
            shape: group.shape_name().to_string(),
            accessor: accessor.to_string(),
            message,
        },
    })
}

fn fold(acc: u64, hash: u64) -> u64 {
    acc.wrapping_mul(HASH_MULTIPLIER).wrapping_add(hash)
}

fn scalar_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
