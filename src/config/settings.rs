//! Controller settings file parser
//!
//! This module handles parsing of the TOML settings file that tells the
//! session controller which provider identity is "ours", what to call a
//! session when the host gives no name, and the optional host watchdog.

use super::validation::validate_identifier;
use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default provider identifier
pub const DEFAULT_IDENTIFIER: &str = "app.wg-session.tunnel";

/// Default upper bound on the persisted payload
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Settings file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Session controller settings
    #[serde(default)]
    pub session: SessionSettings,

    /// Profile store settings
    #[serde(default)]
    pub profile: ProfileSettings,
}

/// `[session]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Provider identifier used to recognise our own profile
    #[serde(default = "default_identifier")]
    pub identifier: String,

    /// Display name used when the host passes an empty session name
    #[serde(default = "default_session_name")]
    pub default_name: String,

    /// Optional host watchdog in seconds; unset means no timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchdog_secs: Option<u64>,
}

/// `[profile]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSettings {
    /// Maximum size of the persisted configuration payload
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            SessionError::Settings(format!("Failed to read settings file {:?}: {}", path, e))
        })?;

        Self::parse(&contents)
    }

    /// Parse settings from a TOML string
    pub fn parse(toml: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(toml)
            .map_err(|e| SessionError::Settings(format!("Failed to parse TOML settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate all settings
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.session.identifier)?;

        if self.session.default_name.trim().is_empty() {
            return Err(SessionError::Settings(
                "Default session name cannot be empty".to_string(),
            ));
        }

        if self.session.watchdog_secs == Some(0) {
            return Err(SessionError::Settings(
                "Watchdog must be at least 1 second (omit it to disable)".to_string(),
            ));
        }

        if self.profile.max_payload_bytes == 0 {
            return Err(SessionError::Settings(
                "max_payload_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Watchdog duration, if configured
    pub fn watchdog(&self) -> Option<Duration> {
        self.session.watchdog_secs.map(Duration::from_secs)
    }

    /// Settings with a specific provider identifier and defaults elsewhere
    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        let mut settings = Self::default();
        settings.session.identifier = identifier.into();
        settings
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            identifier: default_identifier(),
            default_name: default_session_name(),
            watchdog_secs: None,
        }
    }
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

// Default value functions
fn default_identifier() -> String {
    DEFAULT_IDENTIFIER.to_string()
}

fn default_session_name() -> String {
    "WireGuard".to_string()
}

fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}
