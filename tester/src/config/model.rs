//! Test classes, profiles and the resources they declare

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::settings::ServiceConfig;

/// A resource a test class or profile needs while it runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResource {
    pub name: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
    /// Exclusive resources force a context dedicated to the declaring test class
    #[serde(default)]
    pub exclusive: bool,
}

impl TestResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: BTreeMap::new(),
            exclusive: false,
        }
    }

    pub fn exclusive(name: impl Into<String>) -> Self {
        Self {
            exclusive: true,
            ..Self::new(name)
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Stable identity: the name followed by the sorted arguments
    pub fn identity(&self) -> String {
        if self.args.is_empty() {
            return self.name.clone();
        }
        let args: Vec<String> = self.args.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{}({})", self.name, args.join(","))
    }
}

/// A unit of tests sharing one runtime context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestClass {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<TestResource>,
}

impl TestClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
        }
    }

    pub fn builder(name: impl Into<String>) -> super::builder::TestClassBuilder {
        super::builder::TestClassBuilder::new(name)
    }
}

/// A named runtime configuration selected by a test class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: Vec<TestResource>,
    /// Managed services keyed by feature name
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: BTreeMap::new(),
            resources: Vec::new(),
            services: BTreeMap::new(),
        }
    }

    pub fn builder(name: impl Into<String>) -> super::builder::ProfileBuilder {
        super::builder::ProfileBuilder::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_identity_sorts_arguments() {
        let resource = TestResource::new("wiremock").with_arg("port", "8089").with_arg("host", "localhost");
        assert_eq!(resource.identity(), "wiremock(host=localhost,port=8089)");
        assert_eq!(TestResource::new("kafka").identity(), "kafka");
    }

    #[test]
    fn test_profile_deserializes_with_defaults() {
        let profile: Profile = serde_json::from_str(r#"{"name": "it"}"#).unwrap();
        assert_eq!(profile, Profile::new("it"));

        let resource: TestResource = serde_json::from_str(r#"{"name": "db", "exclusive": true}"#).unwrap();
        assert!(resource.exclusive);
    }
}
