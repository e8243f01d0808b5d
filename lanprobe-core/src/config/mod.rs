//! Configuration module
//!
//! Harness configuration: how to reach the VPN client, how long to wait for
//! it, which settings stay fixed for the whole suite, and how to find and
//! probe the LAN peer. Every field has a default so the harness runs with no
//! configuration file at all.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::{SettingKey, SettingValue};

pub mod toml_config;

/// Complete harness configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// VPN client control settings
    #[serde(default)]
    pub client: ClientConfig,

    /// Settings applied once at suite setup
    #[serde(default)]
    pub stable_settings: StableSettings,

    /// Reachability probe settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Default gateway lookup settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl HarnessConfig {
    /// Validate every section, reporting the first invalid field
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client.validate()?;
        self.probe.validate()?;
        self.gateway.validate()?;
        Ok(())
    }
}

fn check_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        Err(ConfigError::InvalidField {
            field: field.to_string(),
            message: format!("{} is outside {}..={}", value, min, max),
        })
    } else {
        Ok(())
    }
}

/// How to drive the VPN client's control CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Control binary name or path, looked up on PATH
    pub ctl_path: String,

    /// Upper bound for a single CLI invocation
    pub command_timeout_secs: u64,

    /// Interval between client state queries while waiting
    pub poll_interval_ms: u64,

    /// How long `connect` may take to settle
    pub connect_timeout_secs: u64,

    /// How long `disconnect` may take to settle
    pub disconnect_timeout_secs: u64,

    /// How long a written setting may take to read back
    pub settle_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ctl_path: "piactl".to_string(),
            command_timeout_secs: 15,
            poll_interval_ms: 250,
            connect_timeout_secs: 60,
            disconnect_timeout_secs: 30,
            settle_timeout_secs: 10,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ctl_path.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "client.ctl_path".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        check_range("client.command_timeout_secs", self.command_timeout_secs, 1, 300)?;
        check_range("client.poll_interval_ms", self.poll_interval_ms, 10, 10_000)?;
        check_range("client.connect_timeout_secs", self.connect_timeout_secs, 1, 600)?;
        check_range("client.disconnect_timeout_secs", self.disconnect_timeout_secs, 1, 600)?;
        check_range("client.settle_timeout_secs", self.settle_timeout_secs, 1, 120)?;
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.disconnect_timeout_secs)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_secs(self.settle_timeout_secs)
    }
}

/// Settings fixed for the whole suite
///
/// `overrideDNS = ""` selects the client's "use existing DNS" mode, and
/// `killswitch = "auto"` is required for allow-LAN to have any effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableSettings {
    #[serde(rename = "overrideDNS", default)]
    pub override_dns: String,

    #[serde(default = "default_killswitch")]
    pub killswitch: String,

    /// Any further client settings, applied after the two above
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

fn default_killswitch() -> String {
    "auto".to_string()
}

impl Default for StableSettings {
    fn default() -> Self {
        Self {
            override_dns: String::new(),
            killswitch: default_killswitch(),
            extra: BTreeMap::new(),
        }
    }
}

impl StableSettings {
    /// Settings in the order they must be applied
    pub fn entries(&self) -> Vec<(SettingKey, SettingValue)> {
        let mut entries = vec![
            (
                SettingKey::from(SettingKey::OVERRIDE_DNS),
                SettingValue::new(self.override_dns.as_str()),
            ),
            (
                SettingKey::from(SettingKey::KILLSWITCH),
                SettingValue::new(self.killswitch.as_str()),
            ),
        ];
        entries.extend(
            self.extra
                .iter()
                .map(|(k, v)| (SettingKey::new(k.as_str()), SettingValue::new(v.as_str()))),
        );
        entries
    }
}

/// Reachability probe settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// How long a probe waits for a reply
    pub timeout_secs: u64,

    /// `ping` binary name or path
    pub ping_path: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            ping_path: "ping".to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("probe.timeout_secs", self.timeout_secs, 1, 60)?;
        if self.ping_path.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "probe.ping_path".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which address family the default gateway is taken from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Ipv4,
    Ipv6,
    /// IPv4 when available, otherwise IPv6
    Any,
}

/// Default gateway lookup settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub family: AddressFamily,

    /// Fixed LAN peer instead of the default gateway
    pub address: Option<IpAddr>,

    /// Extra interface name prefixes to treat as VPN-created
    pub virtual_interface_prefixes: Vec<String>,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(address) = self.address {
            if address.is_unspecified() || address.is_loopback() || address.is_multicast() {
                return Err(ConfigError::InvalidField {
                    field: "gateway.address".to_string(),
                    message: format!("{} cannot be a LAN peer", address),
                });
            }
        }

        if self
            .virtual_interface_prefixes
            .iter()
            .any(|p| p.trim().is_empty())
        {
            return Err(ConfigError::InvalidField {
                field: "gateway.virtual_interface_prefixes".to_string(),
                message: "prefixes cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}
