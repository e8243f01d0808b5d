//! One-off probe command

use colored::Colorize;
use lanprobe_core::config::HarnessConfig;
use lanprobe_core::error::HarnessError;
use lanprobe_core::net::probe::parse_target;
use lanprobe_core::net::{PingProber, Reachability};
use std::time::Duration;

/// Probe `address` once; exits non-zero when it does not answer
pub async fn run_probe(
    config: &HarnessConfig,
    address: &str,
    timeout_secs: Option<u64>,
) -> Result<super::Outcome, HarnessError> {
    let target = parse_target(address)?;
    let timeout = timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.probe.timeout());

    let prober = PingProber::new(&config.probe, &config.gateway)?;

    if prober.probe(target, timeout).await? {
        println!("{} {}", target, "reachable".green());
        Ok(super::Outcome::Success)
    } else {
        println!("{} {}", target, "unreachable".red());
        Ok(super::Outcome::Failed)
    }
}
