//! Allow-LAN scenarios and the suite that runs them
//!
//! A scenario is plain data: which allow-LAN value to set, whether to
//! connect, and whether the gateway should answer afterwards.

use serde::{Deserialize, Serialize};

pub mod context;
pub mod report;
pub mod runner;

pub use context::SuiteContext;
pub use report::{ScenarioOutcome, SuiteReport, Verdict};
pub use runner::SuiteRunner;

/// One allow-LAN test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub group: String,
    pub allow_lan: bool,
    pub connect: bool,
    pub expect_reachable: bool,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        allow_lan: bool,
        connect: bool,
        expect_reachable: bool,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            allow_lan,
            connect,
            expect_reachable,
        }
    }

    /// Whether `filter` names this scenario or its group
    pub fn matches(&self, filter: &str) -> bool {
        self.name.contains(filter) || self.group.contains(filter)
    }
}

/// The built-in allow-LAN suite
///
/// While disconnected the LAN is always reachable. While connected with the
/// killswitch enforcing, only allow-LAN keeps it reachable.
pub fn allow_lan_suite() -> Vec<Scenario> {
    vec![
        Scenario::new("disconnected_allowlan_off", "disconnected", false, false, true),
        Scenario::new("disconnected_allowlan_on", "disconnected", true, false, true),
        Scenario::new("connected_allowlan_off", "connected", false, true, false),
        Scenario::new("connected_allowlan_on", "connected", true, true, true),
    ]
}
