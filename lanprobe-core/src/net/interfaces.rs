//! Local network interfaces and physical/virtual classification
//!
//! The harness cares about one distinction: interfaces created by a VPN
//! (tunnels, point-to-point links) versus the physical interface that
//! connects the host to its LAN.

use ipnetwork::IpNetwork;
use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;
use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};
use tracing::debug;

/// Name prefixes of interfaces VPN software creates
const VIRTUAL_PREFIXES: &[&str] = &["tun", "tap", "wg", "utun", "ppp", "ipsec", "nordlynx"];

/// One address assigned to a local interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    pub name: String,
    /// Own address with the subnet prefix
    pub network: IpNetwork,
    pub point_to_point: bool,
}

impl LocalInterface {
    /// Whether `target` lies inside this interface's subnet
    pub fn contains(&self, target: IpAddr) -> bool {
        self.network.contains(target)
    }

    pub fn prefix(&self) -> u8 {
        self.network.prefix()
    }
}

/// Decides which interface names belong to VPN software
#[derive(Debug, Clone, Default)]
pub struct InterfaceFilter {
    extra_prefixes: Vec<String>,
}

impl InterfaceFilter {
    pub fn new(extra_prefixes: &[String]) -> Self {
        Self {
            extra_prefixes: extra_prefixes.to_vec(),
        }
    }

    /// Loopback and VPN-created interfaces are virtual
    pub fn is_virtual(&self, name: &str) -> bool {
        name == "lo"
            || VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p))
            || self.extra_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    pub fn is_physical(&self, interface: &LocalInterface) -> bool {
        !interface.point_to_point && !self.is_virtual(&interface.name)
    }
}

/// Enumerate the addresses of every interface that is up
pub fn list_local_interfaces() -> Result<Vec<LocalInterface>, nix::Error> {
    let mut interfaces = Vec::new();

    for ifaddr in getifaddrs()? {
        if !ifaddr.flags.contains(InterfaceFlags::IFF_UP) {
            continue;
        }
        let (Some(address), Some(netmask)) = (ifaddr.address, ifaddr.netmask) else {
            continue;
        };

        let pair = if let (Some(addr), Some(mask)) =
            (address.as_sockaddr_in(), netmask.as_sockaddr_in())
        {
            let addr = SocketAddrV4::from(*addr);
            let mask = SocketAddrV4::from(*mask);
            Some((IpAddr::V4(*addr.ip()), IpAddr::V4(*mask.ip())))
        } else if let (Some(addr), Some(mask)) =
            (address.as_sockaddr_in6(), netmask.as_sockaddr_in6())
        {
            let addr = SocketAddrV6::from(*addr);
            let mask = SocketAddrV6::from(*mask);
            Some((IpAddr::V6(*addr.ip()), IpAddr::V6(*mask.ip())))
        } else {
            None
        };
        let Some((address, mask)) = pair else {
            continue;
        };

        match IpNetwork::with_netmask(address, mask) {
            Ok(network) => interfaces.push(LocalInterface {
                name: ifaddr.interface_name.clone(),
                network,
                point_to_point: ifaddr.flags.contains(InterfaceFlags::IFF_POINTOPOINT),
            }),
            // Non-contiguous masks have no prefix form
            Err(e) => debug!("Skipping {} {}: {}", ifaddr.interface_name, address, e),
        }
    }

    Ok(interfaces)
}

/// Pick the physical interface whose subnet holds `target`
///
/// A `preferred` interface wins when it matches; otherwise the longest
/// prefix wins, first listed on ties.
pub fn on_link_interface<'a>(
    target: IpAddr,
    interfaces: &'a [LocalInterface],
    filter: &InterfaceFilter,
    preferred: Option<&str>,
) -> Option<&'a LocalInterface> {
    let matching = interfaces
        .iter()
        .filter(|i| filter.is_physical(i) && i.contains(target));

    if let Some(name) = preferred {
        if let Some(hit) = matching.clone().find(|i| i.name == name) {
            return Some(hit);
        }
    }

    matching.fold(None, |best: Option<&'a LocalInterface>, candidate| match best {
        Some(b) if b.prefix() >= candidate.prefix() => Some(b),
        _ => Some(candidate),
    })
}
