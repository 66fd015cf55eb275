//! Test Class and Profile Builders
//!
//! Fluent construction of test classes and profiles for programmatic suites and tests

use super::model::{Profile, TestClass, TestResource};
use super::settings::ServiceConfig;

pub struct TestClassBuilder {
    class: TestClass,
}

impl TestClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            class: TestClass::new(name),
        }
    }

    /// Declare a resource shared with other test classes
    pub fn resource(mut self, resource: TestResource) -> Self {
        self.class.resources.push(resource);
        self
    }

    /// Declare a resource that needs a context of its own
    pub fn exclusive_resource(mut self, name: impl Into<String>) -> Self {
        self.class.resources.push(TestResource::exclusive(name));
        self
    }

    pub fn build(self) -> TestClass {
        self.class
    }
}

pub struct ProfileBuilder {
    profile: Profile,
}

impl ProfileBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            profile: Profile::new(name),
        }
    }

    /// Add a setting visible to the application under test
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.profile.settings.insert(key.into(), value.into());
        self
    }

    pub fn resource(mut self, resource: TestResource) -> Self {
        self.profile.resources.push(resource);
        self
    }

    pub fn exclusive_resource(mut self, name: impl Into<String>) -> Self {
        self.profile.resources.push(TestResource::exclusive(name));
        self
    }

    /// Require a managed service for a feature
    pub fn service(mut self, feature: impl Into<String>, config: ServiceConfig) -> Self {
        self.profile.services.insert(feature.into(), config);
        self
    }

    pub fn build(self) -> Profile {
        self.profile
    }
}
