//! Client status command

use lanprobe_core::config::HarnessConfig;
use lanprobe_core::error::HarnessError;
use lanprobe_core::types::SettingKey;
use lanprobe_core::vpn::{CtlClient, VpnControl};

/// Print the client's connection state and the settings the suite touches
pub async fn run_status(config: &HarnessConfig) -> Result<super::Outcome, HarnessError> {
    let client = CtlClient::new(&config.client)?;

    let state = client.connection_state().await?;
    println!("Connection: {}", state);

    for key in [
        SettingKey::ALLOW_LAN,
        SettingKey::KILLSWITCH,
        SettingKey::OVERRIDE_DNS,
    ] {
        let value = client.get_setting(&SettingKey::from(key)).await?;
        println!("{}: {:?}", key, value.as_str());
    }

    Ok(super::Outcome::Success)
}
