//! System network settings derived from a tunnel configuration
//!
//! This is the shape a platform shim applies to the tunnel interface:
//! per-family addresses (IPv4 with dotted-quad masks, IPv6 with prefix
//! lengths), routes taken from the peers' allowed IPs, DNS, and MTU.

use super::{AddressFamily, CidrAddress, TunnelConfig};
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// IPv4 interface settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ipv4Settings {
    /// Interface addresses
    pub addresses: Vec<Ipv4Addr>,
    /// Subnet mask per address, same order
    pub subnet_masks: Vec<Ipv4Addr>,
    /// Routes sent through the tunnel
    pub included_routes: Vec<CidrAddress>,
}

/// IPv6 interface settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ipv6Settings {
    /// Interface addresses
    pub addresses: Vec<Ipv6Addr>,
    /// Prefix length per address, same order
    pub prefix_lengths: Vec<u8>,
    /// Routes sent through the tunnel
    pub included_routes: Vec<CidrAddress>,
}

/// Network settings for the tunnel interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSettings {
    /// Host of the first peer endpoint
    pub tunnel_remote_address: Option<String>,
    /// IPv4 settings, absent when no IPv4 address is configured
    pub ipv4: Option<Ipv4Settings>,
    /// IPv6 settings, absent when no IPv6 address is configured
    pub ipv6: Option<Ipv6Settings>,
    /// DNS servers, in configuration order
    pub dns_servers: Vec<String>,
    /// Interface MTU
    pub mtu: Option<u16>,
}

impl NetworkSettings {
    /// Derive network settings from a parsed configuration
    pub fn from_config(config: &TunnelConfig) -> Self {
        let mut ipv4 = Ipv4Settings::default();
        let mut ipv6 = Ipv6Settings::default();

        for address in &config.addresses {
            match address.ip {
                IpAddr::V4(ip) => {
                    ipv4.addresses.push(ip);
                    ipv4.subnet_masks
                        .push(super::ipv4_subnet_mask(address.prefix_len));
                }
                IpAddr::V6(ip) => {
                    ipv6.addresses.push(ip);
                    ipv6.prefix_lengths.push(address.prefix_len);
                }
            }
        }

        for route in config.peers.iter().flat_map(|p| p.allowed_ips.iter()) {
            let routes = match route.family() {
                AddressFamily::IPv4 => &mut ipv4.included_routes,
                AddressFamily::IPv6 => &mut ipv6.included_routes,
            };
            if !routes.contains(route) {
                routes.push(*route);
            }
        }

        Self {
            tunnel_remote_address: config.primary_endpoint().map(|e| e.host.clone()),
            ipv4: (!ipv4.addresses.is_empty()).then_some(ipv4),
            ipv6: (!ipv6.addresses.is_empty()).then_some(ipv6),
            dns_servers: config.dns_servers.clone(),
            mtu: config.mtu,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "\
[Interface]
PrivateKey = yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=
Address = 192.168.1.1/24, fd00::2/64
DNS = 10.0.0.1

[Peer]
PublicKey = xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg=
AllowedIPs = 0.0.0.0/0, ::/0
Endpoint = 203.0.113.5:51820

[Peer]
PublicKey = TrMvSoP4jYQlY6RIzBgbssQqY3vxI2Pi+y71lOWWXX0=
AllowedIPs = 0.0.0.0/0, 10.8.0.0/16
";

    #[test]
    fn test_network_settings() {
        let config = TunnelConfig::parse(CONFIG).unwrap();
        let settings = NetworkSettings::from_config(&config);

        assert_eq!(settings.tunnel_remote_address.as_deref(), Some("203.0.113.5"));
        assert_eq!(settings.dns_servers, vec!["10.0.0.1"]);
        assert_eq!(settings.mtu, None);

        let ipv4 = settings.ipv4.unwrap();
        assert_eq!(ipv4.addresses, vec![Ipv4Addr::new(192, 168, 1, 1)]);
        assert_eq!(ipv4.subnet_masks, vec![Ipv4Addr::new(255, 255, 255, 0)]);
        // Duplicate 0.0.0.0/0 from the second peer is collapsed
        assert_eq!(ipv4.included_routes.len(), 2);

        let ipv6 = settings.ipv6.unwrap();
        assert_eq!(ipv6.prefix_lengths, vec![64]);
        assert_eq!(ipv6.included_routes.len(), 1);
    }

    #[test]
    fn test_ipv4_only() {
        let text = CONFIG.replace(", fd00::2/64", "");
        let settings = TunnelConfig::parse(&text).unwrap().network_settings();
        assert!(settings.ipv4.is_some());
        assert!(settings.ipv6.is_none());
    }
}
