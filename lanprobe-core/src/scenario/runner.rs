//! Suite execution
//!
//! Setup, then each scenario in order, then a forced return to
//! Disconnected. A scenario that errors or mismatches never stops the next
//! one; only errors that make every later observation meaningless (no
//! gateway, no probing) abort the suite. A scenario whose teardown failed
//! leaves the next one to restore Disconnected before it starts.

use chrono::Utc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::HarnessError;
use crate::scenario::context::SuiteContext;
use crate::scenario::report::{ScenarioOutcome, SuiteReport, Verdict};
use crate::scenario::Scenario;
use crate::types::{GatewayAddress, SettingKey};
use crate::vpn::state::ConnectionState;

pub struct SuiteRunner {
    ctx: SuiteContext,
    filter: Option<String>,
}

impl SuiteRunner {
    pub fn new(ctx: SuiteContext) -> Self {
        Self { ctx, filter: None }
    }

    /// Only run scenarios whose name or group contains `filter`
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Run the given scenarios
    ///
    /// # Errors
    ///
    /// Only setup failures are returned as errors. Everything that happens
    /// once scenarios start is recorded in the report.
    #[tracing::instrument(skip_all, fields(filter = ?self.filter))]
    pub async fn run(&mut self, scenarios: &[Scenario]) -> Result<SuiteReport, HarnessError> {
        let started_at = Utc::now();
        let start = Instant::now();

        let selected: Vec<&Scenario> = scenarios
            .iter()
            .filter(|s| self.filter.as_deref().map_or(true, |f| s.matches(f)))
            .collect();
        if selected.is_empty() {
            warn!("No scenario matches the filter");
        }

        let gateway = self.setup().await?;
        let mut report = SuiteReport::new(started_at, gateway.clone());

        for scenario in selected {
            let (outcome, abort_reason) = self.run_scenario(scenario, &gateway).await;
            report.outcomes.push(outcome);

            if let Some(reason) = abort_reason {
                error!("Aborting suite: {}", reason);
                report.aborted = Some(reason);
                break;
            }
        }

        self.teardown(&mut report).await;
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            passed = report.passed(),
            failed = report.failed(),
            "Suite finished"
        );
        Ok(report)
    }

    /// Baseline for every scenario: disconnected, stable settings in effect,
    /// a known gateway and a working prober
    async fn setup(&mut self) -> Result<GatewayAddress, HarnessError> {
        info!("Setting up suite");
        let client = &self.ctx.config.client;

        self.ctx
            .connection
            .disconnect(client.disconnect_timeout())
            .await?;
        self.ctx
            .settings
            .apply_stable(&self.ctx.config.stable_settings)
            .await?;

        let gateway = match &self.ctx.gateway {
            Some(gateway) => gateway.clone(),
            None => self.ctx.resolver.resolve_default_gateway()?,
        };
        self.ctx.gateway = Some(gateway.clone());

        self.ctx.prober.preflight(&gateway).await?;

        info!("Suite ready, probing {}", gateway);
        Ok(gateway)
    }

    /// Returns the outcome and, when the suite cannot go on, the reason
    #[tracing::instrument(skip_all, fields(scenario = %scenario.name))]
    async fn run_scenario(
        &mut self,
        scenario: &Scenario,
        gateway: &GatewayAddress,
    ) -> (ScenarioOutcome, Option<String>) {
        let start = Instant::now();

        let (verdict, fatal) = match self.exercise(scenario, gateway).await {
            Ok(observed) if observed == scenario.expect_reachable => (Verdict::Passed, false),
            Ok(observed) => {
                warn!(
                    expected = scenario.expect_reachable,
                    observed, "Reachability mismatch"
                );
                (
                    Verdict::Failed {
                        expected: scenario.expect_reachable,
                        observed,
                    },
                    false,
                )
            }
            Err(e) => {
                error!("Scenario errored: {}", e);
                (Verdict::errored(&e), e.is_fatal_for_suite())
            }
        };

        let abort_reason = match (&verdict, fatal) {
            (Verdict::Errored { message, .. }, true) => Some(message.clone()),
            _ => None,
        };

        // Teardown runs whatever happened above
        let mut teardown_error = None;
        if scenario.connect || *self.ctx.connection.state() != ConnectionState::Disconnected {
            let timeout = self.ctx.config.client.disconnect_timeout();
            if let Err(e) = self.ctx.connection.force_disconnect(timeout).await {
                teardown_error = Some(e.to_string());
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let mut outcome = ScenarioOutcome::new(scenario, verdict, duration_ms);
        outcome.teardown_error = teardown_error;

        if outcome.is_passed() {
            info!("Scenario passed");
        } else {
            info!(
                teardown_error = ?outcome.teardown_error,
                "Scenario did not pass: {:?}", outcome.verdict
            );
        }
        (outcome, abort_reason)
    }

    /// Toggle, transition, probe; returns the observed reachability
    async fn exercise(
        &mut self,
        scenario: &Scenario,
        gateway: &GatewayAddress,
    ) -> Result<bool, HarnessError> {
        let client = &self.ctx.config.client;

        // An earlier teardown may have left the client mid-transition
        if *self.ctx.connection.state() != ConnectionState::Disconnected {
            warn!(
                "Client is {}, restoring Disconnected first",
                self.ctx.connection.state()
            );
            self.ctx
                .connection
                .disconnect(client.disconnect_timeout())
                .await?;
        }

        self.ctx
            .settings
            .toggle(SettingKey::ALLOW_LAN, scenario.allow_lan)
            .await?;

        if scenario.connect {
            self.ctx.connection.connect(client.connect_timeout()).await?;
        } else {
            self.ctx
                .connection
                .disconnect(client.disconnect_timeout())
                .await?;
        }

        let reachable = self
            .ctx
            .prober
            .probe(gateway.address, self.ctx.config.probe.timeout())
            .await?;
        Ok(reachable)
    }

    /// Final forced disconnect and state check
    async fn teardown(&mut self, report: &mut SuiteReport) {
        let timeout = self.ctx.config.client.disconnect_timeout();
        if let Err(e) = self.ctx.connection.force_disconnect(timeout).await {
            report.teardown_error = Some(e.to_string());
        }

        match self.ctx.connection.refresh().await {
            Ok(state) => {
                if *state != ConnectionState::Disconnected && report.teardown_error.is_none() {
                    report.teardown_error = Some(format!("client left {}", state));
                }
                report.final_state = Some(state.clone());
            }
            Err(e) => {
                warn!("Could not check final client state: {}", e);
                if report.teardown_error.is_none() {
                    report.teardown_error = Some(e.to_string());
                }
            }
        }
    }
}
