//! Cache key derivation
//!
//! Test classes share a runtime context when they select the same profile and
//! neither they nor their profile declare an exclusive resource. An exclusive
//! resource pins the context to the declaring test class and its full
//! resource set.

use std::fmt;

use serde::Serialize;
use shared::NO_PROFILE;

use crate::config::{Profile, TestClass};

/// Resources that force a dedicated context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceFingerprint {
    pub test_class: String,
    /// Sorted identities of every resource declared by the class and its profile
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    pub profile: String,
    pub fingerprint: Option<ResourceFingerprint>,
}

impl CacheKey {
    pub fn derive(test_class: &TestClass, profile: Option<&Profile>) -> Self {
        let profile_resources = profile.map(|p| p.resources.as_slice()).unwrap_or_default();
        let exclusive = test_class
            .resources
            .iter()
            .chain(profile_resources)
            .any(|r| r.exclusive);

        let fingerprint = exclusive.then(|| {
            let mut resources: Vec<String> = test_class
                .resources
                .iter()
                .chain(profile_resources)
                .map(|r| r.identity())
                .collect();
            resources.sort();
            resources.dedup();
            ResourceFingerprint {
                test_class: test_class.name.clone(),
                resources,
            }
        });

        Self {
            profile: profile.map(|p| p.name.clone()).unwrap_or_else(|| NO_PROFILE.to_string()),
            fingerprint,
        }
    }

    pub fn is_exclusive(&self) -> bool {
        self.fingerprint.is_some()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fingerprint {
            None => f.write_str(&self.profile),
            Some(fp) => write!(f, "{}[{}:{}]", self.profile, fp.test_class, fp.resources.join(",")),
        }
    }
}
