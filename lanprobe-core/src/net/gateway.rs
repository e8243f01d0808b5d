//! Default gateway resolution from the host routing table
//!
//! Reads the kernel's route tables (`/proc/net/route` and
//! `/proc/net/ipv6_route`) and picks the next hop of the default route that
//! runs over a physical interface. Routes a VPN installs through its own
//! interfaces are ignored, so the answer is the same before and after a
//! tunnel comes up.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{AddressFamily, GatewayConfig};
use crate::error::ResolutionError;
use crate::net::interfaces::{list_local_interfaces, on_link_interface, InterfaceFilter};
use crate::types::GatewayAddress;

const RTF_UP: u32 = 0x0001;
const RTF_GATEWAY: u32 = 0x0002;

/// A default route candidate
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DefaultRoute {
    pub metric: u32,
    pub interface: String,
    pub gateway: IpAddr,
}

/// Extract default routes from `/proc/net/route` contents
///
/// Columns: Iface Destination Gateway Flags RefCnt Use Metric Mask ...
/// Addresses are hex in the kernel's byte order.
pub fn parse_ipv4_default_routes(contents: &str) -> Vec<DefaultRoute> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 8 {
                return None;
            }

            let destination = u32::from_str_radix(fields[1], 16).ok()?;
            let gateway = u32::from_str_radix(fields[2], 16).ok()?;
            let flags = u32::from_str_radix(fields[3], 16).ok()?;
            let metric = fields[6].parse::<u32>().ok()?;
            let mask = u32::from_str_radix(fields[7], 16).ok()?;

            let is_default = destination == 0 && mask == 0;
            let is_usable = flags & (RTF_UP | RTF_GATEWAY) == (RTF_UP | RTF_GATEWAY);
            if !is_default || !is_usable || gateway == 0 {
                return None;
            }

            Some(DefaultRoute {
                metric,
                interface: fields[0].to_string(),
                gateway: IpAddr::V4(Ipv4Addr::from(gateway.to_ne_bytes())),
            })
        })
        .collect()
}

/// Extract default routes from `/proc/net/ipv6_route` contents
///
/// Columns: dest dest_len src src_len next_hop metric refcnt use flags iface,
/// all hex except the interface name.
pub fn parse_ipv6_default_routes(contents: &str) -> Vec<DefaultRoute> {
    contents
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 {
                return None;
            }

            let destination = u128::from_str_radix(fields[0], 16).ok()?;
            let prefix_len = u8::from_str_radix(fields[1], 16).ok()?;
            let next_hop = u128::from_str_radix(fields[4], 16).ok()?;
            let metric = u32::from_str_radix(fields[5], 16).ok()?;
            let flags = u32::from_str_radix(fields[8], 16).ok()?;

            let is_default = destination == 0 && prefix_len == 0;
            let is_usable = flags & (RTF_UP | RTF_GATEWAY) == (RTF_UP | RTF_GATEWAY);
            if !is_default || !is_usable || next_hop == 0 {
                return None;
            }

            Some(DefaultRoute {
                metric,
                interface: fields[9].to_string(),
                gateway: IpAddr::V6(Ipv6Addr::from(next_hop)),
            })
        })
        .collect()
}

/// Choose the default route of the primary physical interface
///
/// Virtual interfaces are dropped first, then the lowest metric wins. Two
/// different routes sharing the lowest metric are ambiguous.
pub fn select_default_gateway(
    routes: Vec<DefaultRoute>,
    filter: &InterfaceFilter,
) -> Result<GatewayAddress, ResolutionError> {
    let mut physical: Vec<DefaultRoute> = routes
        .into_iter()
        .filter(|r| !filter.is_virtual(&r.interface))
        .collect();
    physical.sort();
    physical.dedup();

    let (best, rest) = physical
        .split_first()
        .ok_or(ResolutionError::NoDefaultRoute)?;

    let tied: Vec<&DefaultRoute> = rest.iter().filter(|r| r.metric == best.metric).collect();
    if !tied.is_empty() {
        let candidates = std::iter::once(best)
            .chain(tied)
            .map(|r| format!("{} dev {} metric {}", r.gateway, r.interface, r.metric))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ResolutionError::Ambiguous { candidates });
    }

    Ok(GatewayAddress::new(best.gateway, best.interface.clone()))
}

/// Where the kernel route tables are read from
#[derive(Debug, Clone)]
pub struct RouteSources {
    pub ipv4: PathBuf,
    pub ipv6: PathBuf,
}

/// Finds the LAN peer the suite probes
#[derive(Debug, Clone)]
pub struct GatewayResolver {
    family: AddressFamily,
    address_override: Option<IpAddr>,
    filter: InterfaceFilter,
    sources: Option<RouteSources>,
}

impl GatewayResolver {
    /// Resolver reading the live kernel tables
    pub fn new(config: &GatewayConfig) -> Self {
        let sources = if cfg!(target_os = "linux") {
            Some(RouteSources {
                ipv4: PathBuf::from("/proc/net/route"),
                ipv6: PathBuf::from("/proc/net/ipv6_route"),
            })
        } else {
            None
        };
        Self::with_sources(config, sources)
    }

    /// Resolver reading route tables from the given files
    pub fn with_sources(config: &GatewayConfig, sources: Option<RouteSources>) -> Self {
        Self {
            family: config.family,
            address_override: config.address,
            filter: InterfaceFilter::new(&config.virtual_interface_prefixes),
            sources,
        }
    }

    /// Resolve the default gateway of the primary physical interface
    #[tracing::instrument(skip(self), fields(family = ?self.family))]
    pub fn resolve_default_gateway(&self) -> Result<GatewayAddress, ResolutionError> {
        if let Some(address) = self.address_override {
            return self.resolve_override(address);
        }

        let sources = self.sources.as_ref().ok_or(ResolutionError::Unsupported)?;

        let gateway = match self.family {
            AddressFamily::Ipv4 => {
                select_default_gateway(self.ipv4_routes(&sources.ipv4)?, &self.filter)
            }
            AddressFamily::Ipv6 => {
                select_default_gateway(self.ipv6_routes(&sources.ipv6)?, &self.filter)
            }
            AddressFamily::Any => {
                match select_default_gateway(self.ipv4_routes(&sources.ipv4)?, &self.filter) {
                    Err(ResolutionError::NoDefaultRoute) => {
                        debug!("No IPv4 default route, trying IPv6");
                        select_default_gateway(self.ipv6_routes(&sources.ipv6)?, &self.filter)
                    }
                    other => other,
                }
            }
        }?;

        info!("Default gateway is {}", gateway);
        Ok(gateway)
    }

    fn ipv4_routes(&self, path: &Path) -> Result<Vec<DefaultRoute>, ResolutionError> {
        let contents = read_route_table(path)?;
        Ok(parse_ipv4_default_routes(&contents))
    }

    fn ipv6_routes(&self, path: &Path) -> Result<Vec<DefaultRoute>, ResolutionError> {
        // Hosts with IPv6 disabled have no ipv6_route file at all
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = read_route_table(path)?;
        Ok(parse_ipv6_default_routes(&contents))
    }

    fn resolve_override(&self, address: IpAddr) -> Result<GatewayAddress, ResolutionError> {
        let interfaces =
            list_local_interfaces().map_err(|e| ResolutionError::RouteTableUnreadable {
                path: "getifaddrs".to_string(),
                reason: e.to_string(),
            })?;

        let interface = on_link_interface(address, &interfaces, &self.filter, None)
            .ok_or(ResolutionError::OverrideNotOnLink { address })?;

        info!("Using configured LAN peer {} on {}", address, interface.name);
        Ok(GatewayAddress::new(address, interface.name.clone()))
    }
}

fn read_route_table(path: &Path) -> Result<String, ResolutionError> {
    std::fs::read_to_string(path).map_err(|e| ResolutionError::RouteTableUnreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_ROUTE: &str = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
eth0\t00000000\t0101A8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0
eth0\t0001A8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0
";

    const PROC_IPV6_ROUTE: &str = "\
00000000000000000000000000000000 00 00000000000000000000000000000000 00 fe800000000000000000000000000001 00000400 00000001 00000000 00450003 eth0
fe800000000000000000000000000000 40 00000000000000000000000000000000 00 00000000000000000000000000000000 00000100 00000001 00000000 00000001 eth0
00000000000000000000000000000000 00 00000000000000000000000000000000 00 00000000000000000000000000000000 ffffffff 00000001 00000000 00200200 lo
";

    #[test]
    fn test_parse_ipv4_default_route() {
        let routes = parse_ipv4_default_routes(PROC_ROUTE);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].interface, "eth0");
        assert_eq!(routes[0].metric, 100);
        if cfg!(target_endian = "little") {
            assert_eq!(routes[0].gateway, "192.168.1.1".parse::<IpAddr>().unwrap());
        }
    }

    #[test]
    fn test_parse_ipv6_default_route() {
        let routes = parse_ipv6_default_routes(PROC_IPV6_ROUTE);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].gateway, "fe80::1".parse::<IpAddr>().unwrap());
        assert_eq!(routes[0].metric, 0x400);
    }

    #[test]
    fn test_parse_ignores_garbage() {
        assert!(parse_ipv4_default_routes("").is_empty());
        assert!(parse_ipv4_default_routes("header\nnot a route line\n").is_empty());
        assert!(parse_ipv6_default_routes("zz 00").is_empty());
    }
}
