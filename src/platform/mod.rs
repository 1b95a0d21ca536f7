//! Platform tunnel provider abstraction
//!
//! The operating system's VPN subsystem owns persisted tunnel profiles and
//! the tunnel lifecycle. This module defines the narrow interface the
//! session controller needs from it, plus the profile and status types
//! that cross that boundary.

mod memory;

pub use memory::{CallLog, InMemoryProvider};

use crate::error::ProfileError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Key under which the raw configuration text is stored in the provider
/// configuration
pub const CONFIG_PAYLOAD_KEY: &str = "wgQuickConfig";

/// Connection status of a persisted profile, as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    /// The profile cannot be used
    Invalid,
    /// Not connected
    Disconnected,
    /// Connection in progress
    Connecting,
    /// Connected
    Connected,
    /// Teardown in progress
    Disconnecting,
    /// Reconnecting after a network change
    Reasserting,
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileStatus::Invalid => write!(f, "invalid"),
            ProfileStatus::Disconnected => write!(f, "disconnected"),
            ProfileStatus::Connecting => write!(f, "connecting"),
            ProfileStatus::Connected => write!(f, "connected"),
            ProfileStatus::Disconnecting => write!(f, "disconnecting"),
            ProfileStatus::Reasserting => write!(f, "reasserting"),
        }
    }
}

/// A tunnel profile persisted in the platform preference store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelProfile {
    /// Platform record key; `None` until first saved
    pub record_id: Option<u64>,
    /// Provider identifier naming the owning application
    pub identifier: String,
    /// User-visible name
    pub display_name: String,
    /// Raw wg-quick configuration text, UTF-8
    pub config_payload: Vec<u8>,
    /// Last status reported by the platform
    pub status: ProfileStatus,
}

impl TunnelProfile {
    /// A new, unsaved profile
    pub fn new(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        config_payload: Vec<u8>,
    ) -> Self {
        Self {
            record_id: None,
            identifier: identifier.into(),
            display_name: display_name.into(),
            config_payload,
            status: ProfileStatus::Invalid,
        }
    }

    /// Configuration text, if the payload is valid UTF-8
    pub fn config_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.config_payload).ok()
    }

    /// Provider configuration dictionary as handed to the platform
    pub fn provider_configuration(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(
            CONFIG_PAYLOAD_KEY.to_string(),
            serde_json::Value::String(self.config_text().unwrap_or_default().to_string()),
        );
        serde_json::Value::Object(map)
    }
}

/// Result of asking the platform to start a tunnel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TunnelStart {
    /// Tunnel interface descriptor, if the platform exposes one
    pub tunnel_fd: Option<i32>,
}

/// A status change pushed by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusNotification {
    /// Provider identifier of the profile that changed
    pub identifier: String,
    /// Generation of the start request this change belongs to; `None` for
    /// changes the platform initiated on its own
    pub generation: Option<u64>,
    /// New status
    pub status: ProfileStatus,
}

/// Sender half handed to the platform for status notifications
pub type StatusSender = mpsc::UnboundedSender<StatusNotification>;

/// The platform VPN subsystem
///
/// Every call may suspend. Implementations must deliver status
/// notifications in the order the platform produced them.
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    /// All profiles visible to this application
    async fn list_profiles(&self) -> Result<Vec<TunnelProfile>, ProfileError>;

    /// Persist a profile; returns the stored copy
    async fn save_profile(&self, profile: &TunnelProfile) -> Result<TunnelProfile, ProfileError>;

    /// Reload a profile from the preference store
    async fn load_profile(&self, profile: &TunnelProfile) -> Result<TunnelProfile, ProfileError>;

    /// Ask the platform to bring the tunnel up; notifications for this
    /// request carry `generation`
    async fn start_profile(
        &self,
        profile: &TunnelProfile,
        generation: u64,
    ) -> Result<TunnelStart, ProfileError>;

    /// Ask the platform to bring the tunnel down
    fn stop_profile(&self, profile: &TunnelProfile);

    /// Register the receiver of status notifications
    fn subscribe_status_changes(&self, sender: StatusSender);
}
