//! UAPI `set` rendering
//!
//! The tunnel engine is configured with the line-oriented cross-platform
//! userspace API text: lowercase `key=value` lines, keys hex-encoded.

use crate::config::TunnelConfig;
use std::fmt::Write;

/// Render a parsed configuration as a UAPI `set` body
pub fn render(config: &TunnelConfig) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "private_key={}", config.private_key.to_hex());
    if let Some(port) = config.listen_port {
        let _ = writeln!(out, "listen_port={}", port);
    }
    let _ = writeln!(out, "replace_peers=true");

    for peer in &config.peers {
        let _ = writeln!(out, "public_key={}", peer.public_key.to_hex());
        if let Some(psk) = &peer.preshared_key {
            let _ = writeln!(out, "preshared_key={}", psk.to_hex());
        }
        if let Some(endpoint) = &peer.endpoint {
            let _ = writeln!(out, "endpoint={}", endpoint);
        }
        let _ = writeln!(
            out,
            "persistent_keepalive_interval={}",
            peer.persistent_keepalive.unwrap_or(0)
        );
        let _ = writeln!(out, "replace_allowed_ips=true");
        for allowed in &peer.allowed_ips {
            let _ = writeln!(out, "allowed_ip={}", allowed);
        }
    }

    out
}

impl TunnelConfig {
    /// Render this configuration as engine settings text
    pub fn to_uapi(&self) -> String {
        render(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "\
[Interface]
PrivateKey = yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=
Address = 10.0.0.2/32
ListenPort = 51820

[Peer]
PublicKey = xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg=
AllowedIPs = 0.0.0.0/0, ::/0
Endpoint = [2001:db8::1]:51820
PersistentKeepalive = 25
";

    #[test]
    fn test_render_lines() {
        let config = TunnelConfig::parse(CONFIG).unwrap();
        let uapi = config.to_uapi();
        let lines: Vec<&str> = uapi.lines().collect();

        assert_eq!(lines[0], format!("private_key={}", config.private_key.to_hex()));
        assert_eq!(lines[1], "listen_port=51820");
        assert_eq!(lines[2], "replace_peers=true");
        assert!(lines[3].starts_with("public_key="));
        assert_eq!(lines[3].len(), "public_key=".len() + 64);
        assert_eq!(lines[4], "endpoint=[2001:db8::1]:51820");
        assert_eq!(lines[5], "persistent_keepalive_interval=25");
        assert_eq!(lines[6], "replace_allowed_ips=true");
        assert_eq!(lines[7], "allowed_ip=0.0.0.0/0");
        assert_eq!(lines[8], "allowed_ip=::/0");
        assert_eq!(lines.len(), 9);
    }

    #[test]
    fn test_render_contains_no_base64() {
        let config = TunnelConfig::parse(CONFIG).unwrap();
        let uapi = config.to_uapi();
        assert!(!uapi.contains("yAnz5TF"));
        assert!(!uapi.contains("xTIBA5rb"));
    }
}
