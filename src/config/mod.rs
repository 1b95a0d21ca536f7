//! Configuration management
//!
//! This module handles parsing of wg-quick tunnel configuration text into a
//! structured [`TunnelConfig`], derivation of system network settings from
//! it, and loading of the controller's own TOML settings file.

mod network;
mod settings;
mod validation;
mod wg_quick;

pub use network::{Ipv4Settings, Ipv6Settings, NetworkSettings};
pub use settings::{
    ProfileSettings, SessionSettings, Settings, DEFAULT_IDENTIFIER, DEFAULT_MAX_PAYLOAD_BYTES,
};
pub use validation::{ipv4_subnet_mask, validate_identifier};
pub use wg_quick::parse;

use crate::error::ConfigError;
use crate::wireguard::{PresharedKey, PrivateKey, PublicKey};
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// Address family of a CIDR address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AddressFamily {
    /// IPv4 address
    IPv4,
    /// IPv6 address
    IPv6,
}

/// An IP address with a prefix length (e.g. `10.0.0.2/24`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CidrAddress {
    /// Address part
    pub ip: IpAddr,
    /// Prefix length (0-32 for IPv4, 0-128 for IPv6)
    pub prefix_len: u8,
}

impl CidrAddress {
    /// Parse a CIDR token (`ip/prefix`)
    pub fn parse(token: &str) -> Result<Self, ConfigError> {
        validation::parse_cidr(token)
    }

    /// Address family of this address
    pub fn family(&self) -> AddressFamily {
        match self.ip {
            IpAddr::V4(_) => AddressFamily::IPv4,
            IpAddr::V6(_) => AddressFamily::IPv6,
        }
    }

    /// Dotted-quad subnet mask for IPv4 addresses, `None` for IPv6
    pub fn subnet_mask(&self) -> Option<Ipv4Addr> {
        match self.family() {
            AddressFamily::IPv4 => Some(ipv4_subnet_mask(self.prefix_len)),
            AddressFamily::IPv6 => None,
        }
    }
}

impl FromStr for CidrAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CidrAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_len)
    }
}

impl Serialize for CidrAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Peer endpoint (`host:port`); the host may be a name or an address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or IP address (IPv6 without brackets)
    pub host: String,
    /// UDP port
    pub port: u16,
}

impl Endpoint {
    /// Parse an endpoint token (`host:port` or `[v6]:port`)
    pub fn parse(token: &str) -> Result<Self, ConfigError> {
        validation::parse_endpoint(token)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A `[Peer]` section
#[derive(Debug, Clone, PartialEq)]
pub struct PeerConfig {
    /// Peer's public key
    pub public_key: PublicKey,
    /// Optional preshared key
    pub preshared_key: Option<PresharedKey>,
    /// Networks routed to this peer
    pub allowed_ips: Vec<CidrAddress>,
    /// Peer endpoint, if known
    pub endpoint: Option<Endpoint>,
    /// Persistent keepalive interval in seconds
    pub persistent_keepalive: Option<u16>,
}

/// Parsed wg-quick configuration
///
/// Created fresh from raw text on every connect and never mutated after
/// parsing. Only the source text is ever persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TunnelConfig {
    /// Interface private key
    pub private_key: PrivateKey,
    /// Interface addresses
    pub addresses: Vec<CidrAddress>,
    /// DNS servers, in configuration order
    pub dns_servers: Vec<String>,
    /// Local listen port
    pub listen_port: Option<u16>,
    /// Interface MTU
    pub mtu: Option<u16>,
    /// Configured peers
    pub peers: Vec<PeerConfig>,
}

impl TunnelConfig {
    /// Parse wg-quick configuration text
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        wg_quick::parse(text)
    }

    /// Interface public key derived from the private key
    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }

    /// Derive the system network settings for this configuration
    pub fn network_settings(&self) -> NetworkSettings {
        NetworkSettings::from_config(self)
    }

    /// Endpoint of the first peer that has one
    pub fn primary_endpoint(&self) -> Option<&Endpoint> {
        self.peers.iter().find_map(|p| p.endpoint.as_ref())
    }
}
