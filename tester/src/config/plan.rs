//! Suite plan
//!
//! The JSON document the `tester` binary runs: launch mode, global managed
//! service settings, the application command, profiles and tests.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use shared::LaunchMode;

use super::model::{Profile, TestClass, TestResource};
use super::settings::DevServicesConfig;
use crate::error::{TesterError, TesterResult};

/// Command line plus environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
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

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One test class to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpec {
    pub class: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub resources: Vec<TestResource>,
    pub command: CommandSpec,
}

impl TestSpec {
    pub fn test_class(&self) -> TestClass {
        TestClass {
            name: self.class.clone(),
            resources: self.resources.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuitePlan {
    #[serde(default)]
    pub launch_mode: LaunchMode,
    #[serde(default)]
    pub devservices: DevServicesConfig,
    /// Application under test, started once per runtime context
    #[serde(default)]
    pub application: Option<CommandSpec>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    pub tests: Vec<TestSpec>,
}

impl SuitePlan {
    /// Read and validate a plan file
    pub fn load(path: impl AsRef<Path>) -> TesterResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> TesterResult<Self> {
        let plan: SuitePlan = serde_json::from_str(content)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Reject duplicate names and references to undeclared profiles
    pub fn validate(&self) -> TesterResult<()> {
        if self.tests.is_empty() {
            return Err(TesterError::InvalidPlan {
                message: "plan declares no tests".to_string(),
            });
        }

        let mut profiles = HashSet::new();
        for profile in &self.profiles {
            if !profiles.insert(profile.name.as_str()) {
                return Err(TesterError::DuplicateName {
                    kind: "profile",
                    name: profile.name.clone(),
                });
            }
        }

        let mut classes = HashSet::new();
        for test in &self.tests {
            if !classes.insert(test.class.as_str()) {
                return Err(TesterError::DuplicateName {
                    kind: "test class",
                    name: test.class.clone(),
                });
            }
            if let Some(profile) = &test.profile {
                if !profiles.contains(profile.as_str()) {
                    return Err(TesterError::UnknownProfile {
                        profile: profile.clone(),
                        test_class: test.class.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }
}
