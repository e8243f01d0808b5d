//! Gateway command

use lanprobe_core::config::HarnessConfig;
use lanprobe_core::error::HarnessError;
use lanprobe_core::net::GatewayResolver;

/// Print the default gateway the suite would probe
pub fn run_gateway(config: &HarnessConfig) -> Result<super::Outcome, HarnessError> {
    let gateway = GatewayResolver::new(&config.gateway).resolve_default_gateway()?;
    println!("{}", gateway);
    Ok(super::Outcome::Success)
}
