//! wg-quick configuration parser
//!
//! Parses the INI-like `[Interface]` / `[Peer]` text format into a
//! [`TunnelConfig`]. Parsing is pure: the same text always yields the same
//! configuration or the same error kind.
//!
//! Directive names are matched case-sensitively. A name that only matches a
//! known directive case-insensitively (e.g. `publickey`) is rejected with
//! [`ConfigError::CaseMismatchKey`] rather than silently accepted. Unknown
//! sections and unknown directives are skipped.

use super::validation::{
    parse_cidr, parse_endpoint, parse_keepalive, parse_mtu, parse_u16, split_list,
};
use super::{CidrAddress, Endpoint, PeerConfig, TunnelConfig};
use crate::error::ConfigError;
use crate::wireguard::{PresharedKey, PrivateKey, PublicKey};
use tracing::{debug, warn};

const INTERFACE_SECTION: &str = "Interface";
const PEER_SECTION: &str = "Peer";

const INTERFACE_KEYS: &[&str] = &["PrivateKey", "Address", "DNS", "ListenPort", "MTU"];
const PEER_KEYS: &[&str] = &[
    "PublicKey",
    "PresharedKey",
    "AllowedIPs",
    "Endpoint",
    "PersistentKeepalive",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Interface,
    Peer,
    Unknown,
}

#[derive(Default)]
struct InterfaceBuilder {
    private_key: Option<PrivateKey>,
    addresses: Vec<CidrAddress>,
    dns_servers: Vec<String>,
    listen_port: Option<u16>,
    mtu: Option<u16>,
}

#[derive(Default)]
struct PeerBuilder {
    public_key: Option<PublicKey>,
    preshared_key: Option<PresharedKey>,
    allowed_ips: Vec<CidrAddress>,
    endpoint: Option<Endpoint>,
    persistent_keepalive: Option<Option<u16>>,
}

/// Parse wg-quick configuration text
pub fn parse(text: &str) -> Result<TunnelConfig, ConfigError> {
    let mut section: Option<Section> = None;
    let mut seen_interface = false;
    let mut interface = InterfaceBuilder::default();
    let mut peers: Vec<PeerBuilder> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') {
            let name = line
                .strip_prefix('[')
                .and_then(|l| l.strip_suffix(']'))
                .map(str::trim)
                .ok_or_else(|| {
                    ConfigError::Malformed(format!("line {}: unterminated section header", line_no))
                })?;

            let next = match_section(name)?;
            match next {
                Section::Interface => {
                    if seen_interface {
                        return Err(ConfigError::Malformed(format!(
                            "line {}: duplicate [Interface] section",
                            line_no
                        )));
                    }
                    seen_interface = true;
                }
                Section::Peer => peers.push(PeerBuilder::default()),
                Section::Unknown => debug!("Skipping unknown section [{}]", name),
            }
            section = Some(next);
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| {
            ConfigError::Malformed(format!("line {}: expected 'Key = Value'", line_no))
        })?;
        let key = key.trim();
        let value = value.trim();

        match section {
            None => {
                return Err(ConfigError::Malformed(format!(
                    "line {}: '{}' appears outside of any section",
                    line_no, key
                )));
            }
            Some(Section::Unknown) => {}
            Some(Section::Interface) => {
                if let Some(key) = canonical_key(key, INTERFACE_KEYS)? {
                    interface.apply(key, value, line_no)?;
                }
            }
            Some(Section::Peer) => {
                if let Some(key) = canonical_key(key, PEER_KEYS)? {
                    // A Peer section always pushes a builder before its keys
                    if let Some(peer) = peers.last_mut() {
                        peer.apply(key, value, line_no)?;
                    }
                }
            }
        }
    }

    build(interface, peers)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn match_section(name: &str) -> Result<Section, ConfigError> {
    for (canonical, section) in [
        (INTERFACE_SECTION, Section::Interface),
        (PEER_SECTION, Section::Peer),
    ] {
        if name == canonical {
            return Ok(section);
        }
        if name.eq_ignore_ascii_case(canonical) {
            return Err(ConfigError::CaseMismatchKey {
                found: name.to_string(),
                expected: canonical.to_string(),
            });
        }
    }
    Ok(Section::Unknown)
}

/// Resolve a directive to its canonical spelling; `None` for unknown keys
fn canonical_key(key: &str, known: &[&'static str]) -> Result<Option<&'static str>, ConfigError> {
    if let Some(exact) = known.iter().find(|k| **k == key) {
        return Ok(Some(*exact));
    }
    if let Some(canonical) = known.iter().find(|k| k.eq_ignore_ascii_case(key)) {
        return Err(ConfigError::CaseMismatchKey {
            found: key.to_string(),
            expected: canonical.to_string(),
        });
    }
    warn!("Ignoring unknown directive '{}'", key);
    Ok(None)
}

fn duplicate(key: &str, line_no: usize) -> ConfigError {
    ConfigError::Malformed(format!("line {}: duplicate {} directive", line_no, key))
}

impl InterfaceBuilder {
    fn apply(&mut self, key: &str, value: &str, line_no: usize) -> Result<(), ConfigError> {
        match key {
            "PrivateKey" => {
                if self.private_key.is_some() {
                    return Err(duplicate(key, line_no));
                }
                self.private_key = Some(PrivateKey::from_base64(value)?);
            }
            "Address" => {
                for token in split_list(value) {
                    self.addresses.push(parse_cidr(token)?);
                }
            }
            "DNS" => {
                self.dns_servers
                    .extend(split_list(value).map(str::to_string));
            }
            "ListenPort" => {
                if self.listen_port.is_some() {
                    return Err(duplicate(key, line_no));
                }
                self.listen_port = Some(parse_u16(key, value)?);
            }
            "MTU" => {
                if self.mtu.is_some() {
                    return Err(duplicate(key, line_no));
                }
                self.mtu = Some(parse_mtu(value)?);
            }
            _ => {}
        }
        Ok(())
    }
}

impl PeerBuilder {
    fn apply(&mut self, key: &str, value: &str, line_no: usize) -> Result<(), ConfigError> {
        match key {
            "PublicKey" => {
                if self.public_key.is_some() {
                    return Err(duplicate(key, line_no));
                }
                self.public_key = Some(PublicKey::from_base64(value)?);
            }
            "PresharedKey" => {
                if self.preshared_key.is_some() {
                    return Err(duplicate(key, line_no));
                }
                self.preshared_key = Some(PresharedKey::from_base64(value)?);
            }
            "AllowedIPs" => {
                for token in split_list(value) {
                    self.allowed_ips.push(parse_cidr(token)?);
                }
            }
            "Endpoint" => {
                if self.endpoint.is_some() {
                    return Err(duplicate(key, line_no));
                }
                self.endpoint = Some(parse_endpoint(value)?);
            }
            "PersistentKeepalive" => {
                if self.persistent_keepalive.is_some() {
                    return Err(duplicate(key, line_no));
                }
                self.persistent_keepalive = Some(parse_keepalive(value)?);
            }
            _ => {}
        }
        Ok(())
    }

    fn build(self) -> Result<PeerConfig, ConfigError> {
        let public_key = self
            .public_key
            .ok_or_else(|| ConfigError::MissingRequiredField("PublicKey".to_string()))?;

        Ok(PeerConfig {
            public_key,
            preshared_key: self.preshared_key,
            allowed_ips: self.allowed_ips,
            endpoint: self.endpoint,
            persistent_keepalive: self.persistent_keepalive.flatten(),
        })
    }
}

fn build(interface: InterfaceBuilder, peers: Vec<PeerBuilder>) -> Result<TunnelConfig, ConfigError> {
    let private_key = interface
        .private_key
        .ok_or_else(|| ConfigError::MissingRequiredField("PrivateKey".to_string()))?;

    if interface.addresses.is_empty() {
        return Err(ConfigError::MissingRequiredField("Address".to_string()));
    }

    let peers = peers
        .into_iter()
        .map(PeerBuilder::build)
        .collect::<Result<Vec<_>, _>>()?;

    if peers.is_empty() {
        return Err(ConfigError::MissingRequiredField("Peer".to_string()));
    }

    if !peers.iter().any(|p| p.endpoint.is_some()) {
        return Err(ConfigError::MissingRequiredField("Endpoint".to_string()));
    }

    debug!(
        "Parsed configuration: {} address(es), {} DNS server(s), {} peer(s)",
        interface.addresses.len(),
        interface.dns_servers.len(),
        peers.len()
    );

    Ok(TunnelConfig {
        private_key,
        addresses: interface.addresses,
        dns_servers: interface.dns_servers,
        listen_port: interface.listen_port,
        mtu: interface.mtu,
        peers,
    })
}
