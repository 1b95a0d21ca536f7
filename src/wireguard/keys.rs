//! WireGuard key handling
//!
//! Keys arrive as base64 text inside wg-quick configuration and leave as
//! lowercase hex inside the engine's UAPI configuration. Private key
//! material is zeroized on drop and never printed.

use crate::error::ConfigError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::fmt;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// Decode a base64 WireGuard key into its 32 raw bytes
fn decode_key(s: &str, what: &str) -> Result<[u8; 32], ConfigError> {
    let decoded = BASE64
        .decode(s.trim())
        .map_err(|e| ConfigError::Malformed(format!("Invalid base64 {}: {}", what, e)))?;

    if decoded.len() != 32 {
        return Err(ConfigError::Malformed(format!(
            "Invalid {} length: expected 32 bytes, got {}",
            what,
            decoded.len()
        )));
    }

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&decoded);
    Ok(bytes)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// WireGuard private key (32 bytes, x25519)
#[derive(Clone)]
pub struct PrivateKey {
    secret: Zeroizing<[u8; 32]>,
}

impl PrivateKey {
    /// Generate a new random private key
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        Self {
            secret: Zeroizing::new(secret.to_bytes()),
        }
    }

    /// Parse a private key from base64-encoded string
    pub fn from_base64(s: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            secret: Zeroizing::new(decode_key(s, "private key")?),
        })
    }

    /// Convert to base64-encoded string
    pub fn to_base64(&self) -> String {
        BASE64.encode(*self.secret)
    }

    /// Convert to lowercase hex (engine UAPI form)
    pub fn to_hex(&self) -> String {
        to_hex(&self.secret[..])
    }

    /// Get the corresponding public key
    pub fn public_key(&self) -> PublicKey {
        let secret = StaticSecret::from(*self.secret);
        let public = X25519PublicKey::from(&secret);
        PublicKey {
            key: public.to_bytes(),
        }
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        *self.secret == *other.secret
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

// Ensure private keys are never accidentally logged
impl fmt::Display for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// WireGuard public key (32 bytes, x25519)
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    key: [u8; 32],
}

impl PublicKey {
    /// Parse a public key from base64-encoded string
    pub fn from_base64(s: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            key: decode_key(s, "public key")?,
        })
    }

    /// Convert to base64-encoded string
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.key)
    }

    /// Convert to lowercase hex (engine UAPI form)
    pub fn to_hex(&self) -> String {
        to_hex(&self.key)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base64())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

/// Optional symmetric key mixed into the handshake
#[derive(Clone, PartialEq, Eq)]
pub struct PresharedKey {
    key: Zeroizing<[u8; 32]>,
}

impl PresharedKey {
    /// Parse a preshared key from base64-encoded string
    pub fn from_base64(s: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            key: Zeroizing::new(decode_key(s, "preshared key")?),
        })
    }

    /// Convert to lowercase hex (engine UAPI form)
    pub fn to_hex(&self) -> String {
        to_hex(&self.key[..])
    }
}

impl fmt::Debug for PresharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PresharedKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_key_to_base64() {
        let private = PrivateKey::generate();
        let base64_str = private.to_base64();
        assert_eq!(base64_str.len(), 44); // Base64 of 32 bytes
    }

    #[test]
    fn test_private_key_from_base64() {
        let private = PrivateKey::generate();
        let restored = PrivateKey::from_base64(&private.to_base64()).unwrap();
        assert_eq!(private, restored);
    }

    #[test]
    fn test_public_key_derivation() {
        let private = PrivateKey::generate();
        assert_eq!(private.public_key(), private.public_key());
    }

    #[test]
    fn test_hex_encoding() {
        let public = PublicKey::from_base64(&BASE64.encode([0xabu8; 32])).unwrap();
        assert_eq!(public.to_hex(), "ab".repeat(32));
    }

    #[test]
    fn test_private_key_not_logged() {
        let private = PrivateKey::generate();
        let debug_str = format!("{:?}", private);
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains(&private.to_base64()));
        assert_eq!(private.to_string(), "[REDACTED]");
    }

    #[test]
    fn test_invalid_base64() {
        assert!(matches!(
            PrivateKey::from_base64("invalid!@#$"),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn test_invalid_length() {
        let short_key = BASE64.encode([0u8; 16]);
        assert!(PublicKey::from_base64(&short_key).is_err());
        assert!(PresharedKey::from_base64(&short_key).is_err());
    }
}
