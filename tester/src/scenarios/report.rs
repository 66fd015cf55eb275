//! Suite outcomes

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::runtime::CacheStats;
use devservices::ServiceSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    /// No context could be obtained, the test command never ran
    Errored,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub class: String,
    pub profile: String,
    pub context: Option<Uuid>,
    pub status: TestStatus,
    pub exit_code: Option<i32>,
    pub message: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<TestOutcome>,
    pub cache: CacheStats,
    pub services: Vec<ServiceSummary>,
}

impl SuiteReport {
    pub fn count(&self, status: TestStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.status == TestStatus::Passed)
    }

    pub fn outcome(&self, class: &str) -> Option<&TestOutcome> {
        self.outcomes.iter().find(|o| o.class == class)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
