//! Suite results
//!
//! Serialised as JSON for `lanprobe run --report`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::scenario::Scenario;
use crate::types::GatewayAddress;
use crate::vpn::state::ConnectionState;

/// How one scenario ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    /// The gateway's reachability did not match the expectation
    Failed { expected: bool, observed: bool },
    /// A step failed before an observation could be made
    Errored { kind: String, message: String },
}

impl Verdict {
    pub fn errored(error: &HarnessError) -> Self {
        Verdict::Errored {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub group: String,
    pub allow_lan: bool,
    pub connect: bool,
    pub verdict: Verdict,
    pub duration_ms: u64,

    /// Set when the client could not be returned to Disconnected afterwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<String>,
}

impl ScenarioOutcome {
    pub fn new(scenario: &Scenario, verdict: Verdict, duration_ms: u64) -> Self {
        Self {
            name: scenario.name.clone(),
            group: scenario.group.clone(),
            allow_lan: scenario.allow_lan,
            connect: scenario.connect,
            verdict,
            duration_ms,
            teardown_error: None,
        }
    }

    /// The expectation held and the client was left disconnected
    pub fn is_passed(&self) -> bool {
        self.verdict.is_passed() && self.teardown_error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub gateway: GatewayAddress,
    pub outcomes: Vec<ScenarioOutcome>,

    /// Set when a fatal error stopped the suite before every scenario ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,

    /// Set when the client could not be returned to Disconnected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<String>,

    /// Client state observed after the final disconnect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_state: Option<ConnectionState>,
}

impl SuiteReport {
    pub fn new(started_at: DateTime<Utc>, gateway: GatewayAddress) -> Self {
        Self {
            started_at,
            duration_ms: 0,
            gateway,
            outcomes: Vec::new(),
            aborted: None,
            teardown_error: None,
            final_state: None,
        }
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    /// Every scenario passed and the client ended disconnected
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.aborted.is_none() && self.teardown_error.is_none()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
