//! LAN reachability probing
//!
//! A probe sends ICMP echo requests bound to the physical interface whose
//! subnet holds the target (`ping -I <iface>`). Binding to the device keeps
//! the VPN's routes from capturing the packet, while the VPN's firewall still
//! sees it, which is exactly what the allow-LAN setting controls. ARP would
//! bypass that firewall and is deliberately not used.

use async_trait::async_trait;
use regex::Regex;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{GatewayConfig, ProbeConfig};
use crate::error::ProbeError;
use crate::net::interfaces::{list_local_interfaces, on_link_interface, InterfaceFilter};
use crate::types::GatewayAddress;

/// Extra time granted to `ping` beyond its own deadline before it is killed
const PING_GRACE: Duration = Duration::from_secs(2);

/// Answers "does this LAN peer respond right now?"
#[async_trait]
pub trait Reachability: Send + Sync {
    /// `Ok(true)` if `target` answered within `timeout`, `Ok(false)` if not
    async fn probe(&self, target: IpAddr, timeout: Duration) -> Result<bool, ProbeError>;

    /// Verify once, before any scenario, that `gateway` can be probed at all
    async fn preflight(&self, _gateway: &GatewayAddress) -> Result<(), ProbeError> {
        Ok(())
    }
}

/// Parse a probe target given as text
pub fn parse_target(raw: &str) -> Result<IpAddr, ProbeError> {
    let target = raw
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| ProbeError::InvalidTarget {
            target: raw.to_string(),
            reason: "not an IP address".to_string(),
        })?;
    validate_target(target)?;
    Ok(target)
}

/// Reject addresses that can never be a LAN peer
pub fn validate_target(target: IpAddr) -> Result<(), ProbeError> {
    let reason = if target.is_unspecified() {
        Some("unspecified address")
    } else if target.is_loopback() {
        Some("loopback address")
    } else if target.is_multicast() {
        Some("multicast address")
    } else if matches!(target, IpAddr::V4(v4) if v4.is_broadcast()) {
        Some("broadcast address")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ProbeError::InvalidTarget {
            target: target.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// What a finished `ping` run means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingVerdict {
    Reply,
    NoReply,
    Unavailable(String),
}

/// Classifies `ping` exit status and stderr
pub struct PingClassifier {
    /// Permission and setup failures, as opposed to blocked or lost packets
    unavailable_pattern: Regex,
}

impl PingClassifier {
    pub fn new() -> Self {
        Self {
            unavailable_pattern: Regex::new(
                r"(?i)socket: (operation not permitted|permission denied)|SO_BINDTODEVICE|cap_net_raw|lacking privilege|unknown iface|address family not supported",
            )
            .expect("Failed to compile ping unavailable pattern"),
        }
    }

    /// Exit 0 is a reply. `sendmsg: Operation not permitted` is a firewall
    /// dropping the packet and counts as no reply.
    pub fn classify(&self, exit_code: Option<i32>, stderr: &str) -> PingVerdict {
        if exit_code == Some(0) {
            return PingVerdict::Reply;
        }

        if let Some(line) = stderr
            .lines()
            .find(|line| self.unavailable_pattern.is_match(line))
        {
            return PingVerdict::Unavailable(line.trim().to_string());
        }

        PingVerdict::NoReply
    }
}

impl Default for PingClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// `ping` deadline in whole seconds, never below one
pub fn deadline_secs(timeout: Duration) -> u64 {
    let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    secs.max(1)
}

/// Arguments for one interface-bound echo with a deadline
pub fn ping_args(target: IpAddr, interface: &str, timeout: Duration) -> Vec<String> {
    let family = if target.is_ipv4() { "-4" } else { "-6" };
    vec![
        family.to_string(),
        "-n".to_string(),
        "-c".to_string(),
        "1".to_string(),
        "-w".to_string(),
        deadline_secs(timeout).to_string(),
        "-I".to_string(),
        interface.to_string(),
        target.to_string(),
    ]
}

/// Reachability prober built on the system `ping`
pub struct PingProber {
    ping: PathBuf,
    filter: InterfaceFilter,
    interface_hint: Option<String>,
    classifier: PingClassifier,
}

impl PingProber {
    /// Locate `ping`; a missing binary makes probing unavailable
    pub fn new(probe: &ProbeConfig, gateway: &GatewayConfig) -> Result<Self, ProbeError> {
        let ping = which::which(&probe.ping_path).map_err(|e| ProbeError::Unavailable {
            reason: format!("Cannot find `{}`: {}", probe.ping_path, e),
        })?;

        Ok(Self {
            ping,
            filter: InterfaceFilter::new(&gateway.virtual_interface_prefixes),
            interface_hint: None,
            classifier: PingClassifier::new(),
        })
    }

    /// Prefer this interface when several physical ones hold the target
    pub fn with_interface_hint(mut self, interface: impl Into<String>) -> Self {
        self.interface_hint = Some(interface.into());
        self
    }

    fn interface_for(&self, target: IpAddr) -> Result<String, ProbeError> {
        let interfaces = list_local_interfaces().map_err(|e| ProbeError::Unavailable {
            reason: format!("Cannot list network interfaces: {}", e),
        })?;

        on_link_interface(
            target,
            &interfaces,
            &self.filter,
            self.interface_hint.as_deref(),
        )
        .map(|i| i.name.clone())
        .ok_or_else(|| ProbeError::InvalidTarget {
            target: target.to_string(),
            reason: "not on a directly attached physical subnet".to_string(),
        })
    }

    async fn run<S: AsRef<std::ffi::OsStr>>(
        &self,
        args: &[S],
        timeout: Duration,
    ) -> Result<PingVerdict, ProbeError> {
        let mut cmd = Command::new(&self.ping);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let guard = Duration::from_secs(deadline_secs(timeout)) + PING_GRACE;
        match tokio::time::timeout(guard, cmd.output()).await {
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Ok(self.classifier.classify(output.status.code(), &stderr))
            }
            Ok(Err(e)) => Err(ProbeError::Unavailable {
                reason: format!("Failed to run {}: {}", self.ping.display(), e),
            }),
            Err(_) => {
                warn!("ping overran its deadline and was killed");
                Ok(PingVerdict::NoReply)
            }
        }
    }
}

#[async_trait]
impl Reachability for PingProber {
    #[tracing::instrument(skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    async fn probe(&self, target: IpAddr, timeout: Duration) -> Result<bool, ProbeError> {
        validate_target(target)?;
        let interface = self.interface_for(target)?;
        let args = ping_args(target, &interface, timeout);

        match self.run(&args[..], timeout).await? {
            PingVerdict::Reply => {
                debug!(%target, %interface, "LAN peer answered");
                Ok(true)
            }
            PingVerdict::NoReply => {
                debug!(%target, %interface, "LAN peer did not answer");
                Ok(false)
            }
            PingVerdict::Unavailable(reason) => Err(ProbeError::Unavailable { reason }),
        }
    }

    /// One echo to the gateway bound to its interface, so the device-binding
    /// privilege every probe needs is checked before any scenario. Only a
    /// privilege or setup failure is an error; silence is left for the
    /// scenarios to judge.
    #[tracing::instrument(skip(self, gateway), fields(gateway = %gateway))]
    async fn preflight(&self, gateway: &GatewayAddress) -> Result<(), ProbeError> {
        let timeout = Duration::from_secs(1);
        let args = ping_args(gateway.address, &gateway.interface, timeout);
        match self.run(&args[..], timeout).await? {
            PingVerdict::Reply => {
                debug!("Probe preflight succeeded");
                Ok(())
            }
            PingVerdict::NoReply => {
                warn!("LAN peer did not answer the probe preflight");
                Ok(())
            }
            PingVerdict::Unavailable(reason) => Err(ProbeError::Unavailable { reason }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        assert_eq!(
            parse_target(" 192.168.1.1 ").unwrap(),
            "192.168.1.1".parse::<IpAddr>().unwrap()
        );
        assert!(matches!(
            parse_target("192.168.1"),
            Err(ProbeError::InvalidTarget { .. })
        ));
        assert!(matches!(
            parse_target("gateway.local"),
            Err(ProbeError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn test_validate_target_rejects_non_peers() {
        for bad in ["0.0.0.0", "127.0.0.1", "::1", "224.0.0.1", "255.255.255.255"] {
            let target: IpAddr = bad.parse().unwrap();
            assert!(validate_target(target).is_err(), "{} should be rejected", bad);
        }
        assert!(validate_target("10.0.0.1".parse().unwrap()).is_ok());
        assert!(validate_target("fe80::1".parse().unwrap()).is_ok());
    }

    #[test]
    fn test_classify_ping() {
        let classifier = PingClassifier::new();
        assert_eq!(classifier.classify(Some(0), ""), PingVerdict::Reply);
        assert_eq!(classifier.classify(Some(1), ""), PingVerdict::NoReply);
        assert_eq!(
            classifier.classify(Some(1), "ping: sendmsg: Operation not permitted\n"),
            PingVerdict::NoReply
        );
        assert_eq!(
            classifier.classify(Some(2), "ping: socket: Operation not permitted\n"),
            PingVerdict::Unavailable("ping: socket: Operation not permitted".to_string())
        );
        assert!(matches!(
            classifier.classify(Some(2), "ping: SO_BINDTODEVICE eth0: Operation not permitted"),
            PingVerdict::Unavailable(_)
        ));
        assert_eq!(classifier.classify(None, ""), PingVerdict::NoReply);
    }

    #[test]
    fn test_deadline_secs() {
        assert_eq!(deadline_secs(Duration::from_millis(0)), 1);
        assert_eq!(deadline_secs(Duration::from_millis(1500)), 2);
        assert_eq!(deadline_secs(Duration::from_secs(5)), 5);
    }

    #[test]
    fn test_ping_args_bind_interface() {
        let args = ping_args("192.168.1.1".parse().unwrap(), "eth0", Duration::from_secs(3));
        assert_eq!(
            args,
            vec!["-4", "-n", "-c", "1", "-w", "3", "-I", "eth0", "192.168.1.1"]
        );

        let args = ping_args("fe80::1".parse().unwrap(), "wlan0", Duration::from_secs(1));
        assert_eq!(args[0], "-6");
        assert_eq!(args.last().map(String::as_str), Some("fe80::1"));
    }
}
