//! Comparable keys for managed services

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use shared::{ConfigComparator, ConfigResult, ConfigValue, Owner};

/// Owner plus the configuration a managed service was started with.
///
/// Settings are opaque and only comparable through a [`ConfigComparator`],
/// so equality and hashing are explicit fallible operations rather than
/// `PartialEq`/`Hash` impls.
#[derive(Clone)]
pub struct ComparableKey {
    owner: Owner,
    global: Option<ConfigValue>,
    feature: Option<ConfigValue>,
}

impl ComparableKey {
    pub fn new(owner: Owner, global: Option<ConfigValue>, feature: Option<ConfigValue>) -> Self {
        Self {
            owner,
            global,
            feature,
        }
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn global_settings(&self) -> Option<&ConfigValue> {
        self.global.as_ref()
    }

    pub fn feature_settings(&self) -> Option<&ConfigValue> {
        self.feature.as_ref()
    }

    /// Structural equality; feature settings are compared before global ones
    pub fn matches(&self, other: &ComparableKey, comparator: &ConfigComparator) -> ConfigResult<bool> {
        if self.owner != other.owner {
            return Ok(false);
        }
        Ok(comparator.equal(self.feature.as_ref(), other.feature.as_ref())?
            && comparator.equal(self.global.as_ref(), other.global.as_ref())?)
    }

    /// Hash consistent with [`ComparableKey::matches`]
    pub fn structural_hash(&self, comparator: &ConfigComparator) -> ConfigResult<u64> {
        let mut hasher = DefaultHasher::new();
        self.owner.hash(&mut hasher);
        let mut result = hasher.finish();
        result = result
            .wrapping_mul(31)
            .wrapping_add(comparator.hash(self.feature.as_ref())?);
        result = result
            .wrapping_mul(31)
            .wrapping_add(comparator.hash(self.global.as_ref())?);
        Ok(result)
    }
}

impl fmt::Debug for ComparableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparableKey")
            .field("owner", &self.owner.to_string())
            .field("global", &self.global)
            .field("feature", &self.feature)
            .finish()
    }
}
