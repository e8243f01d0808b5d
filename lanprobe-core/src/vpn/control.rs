//! Control interface of the external VPN client
//!
//! Everything the harness needs from the client goes through this trait, so
//! the controllers can be driven by the real CLI or by a scripted fake.

use async_trait::async_trait;

use crate::error::ControlError;
use crate::types::{SettingKey, SettingValue};
use crate::vpn::state::ConnectionState;

#[async_trait]
pub trait VpnControl: Send + Sync {
    /// Read the current value of a setting
    async fn get_setting(&self, key: &SettingKey) -> Result<SettingValue, ControlError>;

    /// Write one setting
    async fn set_setting(&self, key: &SettingKey, value: &SettingValue) -> Result<(), ControlError>;

    /// Write several settings, in order
    ///
    /// Implementations may batch the writes; the default writes one by one.
    async fn apply_settings(
        &self,
        settings: &[(SettingKey, SettingValue)],
    ) -> Result<(), ControlError> {
        for (key, value) in settings {
            self.set_setting(key, value).await?;
        }
        Ok(())
    }

    /// Ask the client to connect; returns once the request is accepted
    async fn connect(&self) -> Result<(), ControlError>;

    /// Ask the client to disconnect; returns once the request is accepted
    async fn disconnect(&self) -> Result<(), ControlError>;

    /// Query the current connection state
    async fn connection_state(&self) -> Result<ConnectionState, ControlError>;
}
