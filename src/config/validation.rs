//! Configuration validation functions
//!
//! Token-level parsing and validation for CIDR addresses, endpoints,
//! numeric directives and the controller's provider identifier.

use crate::config::{CidrAddress, Endpoint};
use crate::error::{ConfigError, Result, SessionError};
use std::net::{IpAddr, Ipv4Addr};

/// Parse CIDR notation (IP/prefix)
pub fn parse_cidr(cidr: &str) -> std::result::Result<CidrAddress, ConfigError> {
    let parts: Vec<&str> = cidr.trim().split('/').collect();

    if parts.len() != 2 {
        return Err(ConfigError::Malformed(format!(
            "Invalid CIDR notation: {} (expected format: IP/prefix)",
            cidr
        )));
    }

    let ip: IpAddr = parts[0]
        .parse()
        .map_err(|_| ConfigError::Malformed(format!("Invalid IP address in CIDR: {}", cidr)))?;

    let prefix: u32 = parts[1].parse().map_err(|_| {
        ConfigError::Malformed(format!("Invalid prefix length in CIDR: {}", cidr))
    })?;

    let max_prefix: u8 = match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };

    if prefix > u32::from(max_prefix) {
        return Err(ConfigError::OutOfRangePrefixLength {
            cidr: cidr.to_string(),
            prefix,
            max: max_prefix,
        });
    }

    Ok(CidrAddress {
        ip,
        prefix_len: prefix as u8,
    })
}

/// Convert an IPv4 prefix length (0-32) to a dotted-quad subnet mask
pub fn ipv4_subnet_mask(prefix_len: u8) -> Ipv4Addr {
    let bits = match prefix_len {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - u32::from(p)),
    };
    Ipv4Addr::from(bits)
}

/// Parse endpoint format (host:port or [v6]:port)
pub fn parse_endpoint(endpoint: &str) -> std::result::Result<Endpoint, ConfigError> {
    let endpoint = endpoint.trim();
    let (host, port) = endpoint.rsplit_once(':').ok_or_else(|| {
        ConfigError::Malformed(format!(
            "Invalid endpoint format: {} (expected format: host:port)",
            endpoint
        ))
    })?;

    let port: u16 = port
        .parse()
        .map_err(|_| ConfigError::Malformed(format!("Invalid port in endpoint: {}", endpoint)))?;

    if port == 0 {
        return Err(ConfigError::Malformed(format!(
            "Port number cannot be 0 in endpoint: {}",
            endpoint
        )));
    }

    let host = if let Some(inner) = host.strip_prefix('[') {
        inner.strip_suffix(']').ok_or_else(|| {
            ConfigError::Malformed(format!("Unbalanced brackets in endpoint: {}", endpoint))
        })?
    } else if host.contains(':') {
        // Bare IPv6 without brackets is ambiguous with the port separator
        return Err(ConfigError::Malformed(format!(
            "IPv6 endpoint must be bracketed: {}",
            endpoint
        )));
    } else {
        host
    };

    // Host validation is lenient (can be hostname or IP)
    if host.is_empty() {
        return Err(ConfigError::Malformed(format!(
            "Host cannot be empty in endpoint: {}",
            endpoint
        )));
    }

    Ok(Endpoint {
        host: host.to_string(),
        port,
    })
}

/// Parse a numeric directive into a u16
pub fn parse_u16(key: &str, value: &str) -> std::result::Result<u16, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Malformed(format!("Invalid {} value: {}", key, value)))
}

/// Parse MTU (576-65535)
pub fn parse_mtu(value: &str) -> std::result::Result<u16, ConfigError> {
    let mtu = parse_u16("MTU", value)?;
    if mtu < 576 {
        return Err(ConfigError::Malformed(format!(
            "MTU value {} is below the minimum of 576",
            mtu
        )));
    }
    Ok(mtu)
}

/// Parse a persistent keepalive interval; `off` and `0` disable it
pub fn parse_keepalive(value: &str) -> std::result::Result<Option<u16>, ConfigError> {
    if value.trim() == "off" {
        return Ok(None);
    }
    match parse_u16("PersistentKeepalive", value)? {
        0 => Ok(None),
        secs => Ok(Some(secs)),
    }
}

/// Split a comma-separated list, dropping empty items
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Validate the provider identifier (reverse-DNS style, e.g. `com.example.app.tunnel`)
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(SessionError::Settings(
            "Provider identifier cannot be empty".to_string(),
        ));
    }

    if identifier.len() > 255 {
        return Err(SessionError::Settings(
            "Provider identifier too long (max 255 characters)".to_string(),
        ));
    }

    let segments: Vec<&str> = identifier.split('.').collect();
    if segments.len() < 2 {
        return Err(SessionError::Settings(format!(
            "Provider identifier '{}' must contain at least two dot-separated segments",
            identifier
        )));
    }

    for segment in segments {
        if segment.is_empty()
            || !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(SessionError::Settings(format!(
                "Invalid provider identifier '{}': segments must be non-empty and contain only alphanumeric, dash, and underscore",
                identifier
            )));
        }
    }

    Ok(())
}
