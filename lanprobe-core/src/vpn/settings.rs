//! Confirmed application of VPN client settings
//!
//! A write only counts once the client reads the value back. Reapplying a
//! value the client already holds issues no write at all.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, StableSettings};
use crate::error::ControlError;
use crate::types::{Applied, SettingKey, SettingValue};
use crate::vpn::control::VpnControl;
use crate::vpn::poll::{poll_until, PollOutcome};

/// Pushes settings into the client and waits until they are in effect
pub struct SettingsController {
    client: Arc<dyn VpnControl>,
    poll_interval: Duration,
    settle_timeout: Duration,
}

impl SettingsController {
    pub fn new(client: Arc<dyn VpnControl>, config: &ClientConfig) -> Self {
        Self {
            client,
            poll_interval: config.poll_interval(),
            settle_timeout: config.settle_timeout(),
        }
    }

    /// Apply one setting and wait for the client to confirm it
    ///
    /// # Errors
    ///
    /// * `SettingRejected` if the client refuses the value or never reports
    ///   it within the settle timeout
    /// * `ControllerUnavailable` if the client cannot be reached
    #[tracing::instrument(skip(self), fields(key = %key, value = %value))]
    pub async fn apply(&self, key: &SettingKey, value: &SettingValue) -> Result<Applied, ControlError> {
        let current = self.client.get_setting(key).await?;
        if current == *value {
            debug!("Setting already in effect, skipping write");
            return Ok(Applied::Unchanged);
        }

        self.client.set_setting(key, value).await?;
        self.confirm(key, value).await?;

        info!("Applied {}={:?} (was {:?})", key, value.as_str(), current.as_str());
        Ok(Applied::Changed)
    }

    /// Apply several settings in order and confirm every one of them
    ///
    /// Returns `Changed` if at least one value had to be written.
    pub async fn apply_many(
        &self,
        entries: &[(SettingKey, SettingValue)],
    ) -> Result<Applied, ControlError> {
        let mut pending = Vec::new();
        for (key, value) in entries {
            let current = self.client.get_setting(key).await?;
            if current != *value {
                pending.push((key.clone(), value.clone()));
            } else {
                debug!(key = %key, "Setting already in effect, skipping write");
            }
        }

        if pending.is_empty() {
            return Ok(Applied::Unchanged);
        }

        self.client.apply_settings(&pending).await?;
        for (key, value) in &pending {
            self.confirm(key, value).await?;
            info!("Applied {}={:?}", key, value.as_str());
        }

        Ok(Applied::Changed)
    }

    /// Apply the suite-wide settings fixed once at setup
    pub async fn apply_stable(&self, stable: &StableSettings) -> Result<Applied, ControlError> {
        self.apply_many(&stable.entries()).await
    }

    /// Flip a boolean setting between scenarios
    pub async fn toggle(&self, key: &str, enabled: bool) -> Result<Applied, ControlError> {
        self.apply(&SettingKey::from(key), &SettingValue::from(enabled))
            .await
    }

    async fn confirm(&self, key: &SettingKey, value: &SettingValue) -> Result<(), ControlError> {
        let outcome = poll_until(
            self.poll_interval,
            self.settle_timeout,
            || self.client.get_setting(key),
            |observed| observed == value,
        )
        .await?;

        match outcome {
            PollOutcome::Settled(_) => Ok(()),
            PollOutcome::TimedOut { last, elapsed } => {
                warn!(
                    key = %key,
                    expected = %value,
                    observed = %last,
                    "Client did not confirm setting"
                );
                Err(ControlError::SettingRejected {
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: format!(
                        "client still reports {:?} after {}ms",
                        last.as_str(),
                        elapsed.as_millis()
                    ),
                })
            }
        }
    }
}
