//! Value types shared by the harness subsystems
//!
//! Setting keys and values are opaque strings: their meaning belongs to the
//! VPN client. The wrappers only exist so a key can never be passed where a
//! value is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Name of a VPN client setting, e.g. `allowlan`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingKey(String);

impl SettingKey {
    pub const ALLOW_LAN: &'static str = "allowlan";
    pub const KILLSWITCH: &'static str = "killswitch";
    pub const OVERRIDE_DNS: &'static str = "overrideDNS";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SettingKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of a VPN client setting
///
/// The empty string is a real value (`overrideDNS = ""` means "use the
/// existing DNS"), never a stand-in for "unset".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingValue(String);

impl SettingValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::new(if value { "true" } else { "false" })
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a confirmed settings write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The client held a different value and now reports the requested one
    Changed,
    /// The client already reported the requested value, nothing was written
    Unchanged,
}

/// The default gateway used as the LAN peer for a whole suite run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayAddress {
    /// Next-hop address of the default route
    pub address: IpAddr,
    /// Physical interface carrying that route
    pub interface: String,
}

impl GatewayAddress {
    pub fn new(address: IpAddr, interface: impl Into<String>) -> Self {
        Self {
            address,
            interface: interface.into(),
        }
    }
}

impl fmt::Display for GatewayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dev {}", self.address, self.interface)
    }
}
