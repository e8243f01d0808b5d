//! Scripted stand-ins for the VPN client and the network
#![allow(dead_code)]

use async_trait::async_trait;
use lanprobe_core::config::{ClientConfig, HarnessConfig};
use lanprobe_core::error::{ControlError, ProbeError};
use lanprobe_core::net::Reachability;
use lanprobe_core::types::{GatewayAddress, SettingKey, SettingValue};
use lanprobe_core::vpn::{ConnectionState, VpnControl};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Client config with timings short enough for tests
pub fn fast_client_config() -> ClientConfig {
    ClientConfig {
        ctl_path: "fake-ctl".to_string(),
        command_timeout_secs: 1,
        poll_interval_ms: 10,
        connect_timeout_secs: 1,
        disconnect_timeout_secs: 1,
        settle_timeout_secs: 1,
    }
}

pub fn fast_harness_config() -> HarnessConfig {
    HarnessConfig {
        client: fast_client_config(),
        ..HarnessConfig::default()
    }
}

pub fn test_gateway() -> GatewayAddress {
    GatewayAddress::new("192.168.1.1".parse().unwrap(), "eth0")
}

#[derive(Default)]
struct FakeState {
    settings: HashMap<String, String>,
    state: ConnectionState,
    /// Target state and the number of status queries until it is reached
    pending: Option<(ConnectionState, u32)>,
    settle_polls: u32,
    stuck: bool,
    failing: bool,
    unavailable: bool,
    rejected: HashSet<(String, String)>,
    ignored: HashSet<String>,
    calls: Vec<String>,
}

/// In-memory VPN client
///
/// Connection changes go through Connecting/Disconnecting for a
/// configurable number of status queries before settling.
#[derive(Default)]
pub struct FakeClient {
    inner: Mutex<FakeState>,
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        let client = Self::default();
        {
            let mut inner = client.inner.lock().unwrap();
            inner.settle_polls = 2;
            for (key, value) in [("allowlan", "false"), ("killswitch", "off"), ("overrideDNS", "pia")] {
                inner.settings.insert(key.to_string(), value.to_string());
            }
        }
        Arc::new(client)
    }

    pub fn set_connected(&self) {
        self.inner.lock().unwrap().state = ConnectionState::Connected;
    }

    pub fn set_settle_polls(&self, polls: u32) {
        self.inner.lock().unwrap().settle_polls = polls;
    }

    /// Transitions start but never finish
    pub fn set_stuck(&self, stuck: bool) {
        self.inner.lock().unwrap().stuck = stuck;
    }

    /// Transitions start, then fall back to where they began
    pub fn set_failing_transitions(&self, failing: bool) {
        self.inner.lock().unwrap().failing = failing;
    }

    /// Every call fails as if the daemon were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unwrap().unavailable = unavailable;
    }

    /// `set key value` is refused
    pub fn reject(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .unwrap()
            .rejected
            .insert((key.to_string(), value.to_string()));
    }

    /// `set key ...` is accepted but has no effect
    pub fn ignore_writes_to(&self, key: &str) {
        self.inner.lock().unwrap().ignored.insert(key.to_string());
    }

    pub fn setting(&self, key: &str) -> String {
        self.inner
            .lock()
            .unwrap()
            .settings
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().unwrap().state.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn check_available(inner: &FakeState) -> Result<(), ControlError> {
        if inner.unavailable {
            Err(ControlError::ControllerUnavailable {
                reason: "Unable to connect to daemon".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn request(&self, call: &str, transit: ConnectionState, target: ConnectionState) -> Result<(), ControlError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_available(&inner)?;
        inner.calls.push(call.to_string());
        if inner.state != target {
            let settled = if inner.failing {
                inner.state.clone()
            } else {
                target
            };
            inner.state = transit;
            inner.pending = Some((settled, inner.settle_polls));
        }
        Ok(())
    }
}

#[async_trait]
impl VpnControl for FakeClient {
    async fn get_setting(&self, key: &SettingKey) -> Result<SettingValue, ControlError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_available(&inner)?;
        inner.calls.push(format!("get {}", key));
        Ok(SettingValue::new(
            inner.settings.get(key.as_str()).cloned().unwrap_or_default(),
        ))
    }

    async fn set_setting(&self, key: &SettingKey, value: &SettingValue) -> Result<(), ControlError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_available(&inner)?;
        inner.calls.push(format!("set {} {}", key, value));

        if inner
            .rejected
            .contains(&(key.to_string(), value.to_string()))
        {
            return Err(ControlError::SettingRejected {
                key: key.to_string(),
                value: value.to_string(),
                reason: "invalid value".to_string(),
            });
        }
        if !inner.ignored.contains(key.as_str()) {
            inner.settings.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn connect(&self) -> Result<(), ControlError> {
        self.request("connect", ConnectionState::Connecting, ConnectionState::Connected)
    }

    async fn disconnect(&self) -> Result<(), ControlError> {
        self.request(
            "disconnect",
            ConnectionState::Disconnecting,
            ConnectionState::Disconnected,
        )
    }

    async fn connection_state(&self) -> Result<ConnectionState, ControlError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_available(&inner)?;
        inner.calls.push("get connectionstate".to_string());

        let stuck = inner.stuck;
        if let Some((target, remaining)) = inner.pending.take() {
            if stuck {
                inner.pending = Some((target, remaining));
            } else if remaining == 0 {
                inner.state = target;
            } else {
                inner.pending = Some((target, remaining - 1));
            }
        }
        Ok(inner.state.clone())
    }
}

/// LAN model driven by the fake client's state
///
/// The gateway is blocked only while connected with an enforcing killswitch
/// and allow-LAN off, unless `ignore_allow_lan` simulates a broken client.
pub struct FakeProber {
    client: Arc<FakeClient>,
    ignore_allow_lan: bool,
    unavailable: bool,
    /// Probes answered before probing breaks down
    fail_after: Option<usize>,
    /// The next probe leaves the client unable to finish a transition
    wedge_client: AtomicBool,
    /// Probing takes the client's daemon down with it
    drop_client: bool,
    probes: Mutex<Vec<IpAddr>>,
}

impl FakeProber {
    pub fn new(client: Arc<FakeClient>) -> Self {
        Self {
            client,
            ignore_allow_lan: false,
            unavailable: false,
            fail_after: None,
            wedge_client: AtomicBool::new(false),
            drop_client: false,
            probes: Mutex::new(Vec::new()),
        }
    }

    pub fn ignoring_allow_lan(mut self) -> Self {
        self.ignore_allow_lan = true;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Preflight passes but probing becomes unavailable after `count` probes
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    pub fn wedging_client(self) -> Self {
        self.wedge_client.store(true, Ordering::SeqCst);
        self
    }

    pub fn dropping_client(mut self) -> Self {
        self.drop_client = true;
        self
    }

    pub fn probes(&self) -> Vec<IpAddr> {
        self.probes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reachability for FakeProber {
    async fn probe(&self, target: IpAddr, _timeout: Duration) -> Result<bool, ProbeError> {
        {
            let mut probes = self.probes.lock().unwrap();
            if self.fail_after.is_some_and(|n| probes.len() >= n) {
                return Err(ProbeError::Unavailable {
                    reason: "ping: SO_BINDTODEVICE eth0: Operation not permitted".to_string(),
                });
            }
            probes.push(target);
        }

        if self.wedge_client.swap(false, Ordering::SeqCst) {
            self.client.set_stuck(true);
        }
        if self.drop_client {
            self.client.set_unavailable(true);
        }

        let connected = self.client.state() == ConnectionState::Connected;
        let enforcing = self.client.setting("killswitch") != "off";
        let allow_lan = self.client.setting("allowlan") == "true" && !self.ignore_allow_lan;
        Ok(!(connected && enforcing && !allow_lan))
    }

    async fn preflight(&self, _gateway: &GatewayAddress) -> Result<(), ProbeError> {
        if self.unavailable {
            Err(ProbeError::Unavailable {
                reason: "ping: socket: Operation not permitted".to_string(),
            })
        } else {
            Ok(())
        }
    }
}
