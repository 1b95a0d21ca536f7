//! Session lifecycle
//!
//! The session controller is the host-facing surface: it turns raw
//! configuration text into a running tunnel, tracks the lifecycle phase,
//! reconciles it with platform status notifications, and reports changes
//! through the event bridge.

mod controller;
mod watchdog;

pub use controller::SessionController;

use crate::error::SessionError;
use crate::wireguard::TunnelHandle;
use std::fmt;

/// Lifecycle phase of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing has happened yet
    Idle,
    /// Persisting the profile
    Saving,
    /// Reloading the saved profile
    Loading,
    /// Tunnel start issued; waiting for the platform to report connected
    Starting,
    /// Tunnel is up
    Connected,
    /// Teardown issued; waiting for the platform to report disconnected
    Stopping,
    /// Tunnel is down
    Disconnected,
    /// The last attempt failed
    Failed(SessionError),
}

impl SessionPhase {
    /// Check if the tunnel is up
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionPhase::Connected)
    }

    /// Check if a new connect may begin from this phase
    pub fn can_connect(&self) -> bool {
        matches!(
            self,
            SessionPhase::Idle | SessionPhase::Disconnected | SessionPhase::Failed(_)
        )
    }

    /// Check if a connect attempt is between input validation and
    /// platform confirmation
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            SessionPhase::Saving | SessionPhase::Loading | SessionPhase::Starting
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Saving => write!(f, "saving"),
            SessionPhase::Loading => write!(f, "loading"),
            SessionPhase::Starting => write!(f, "starting"),
            SessionPhase::Connected => write!(f, "connected"),
            SessionPhase::Stopping => write!(f, "stopping"),
            SessionPhase::Disconnected => write!(f, "disconnected"),
            SessionPhase::Failed(err) => write!(f, "failed ({})", err.kind()),
        }
    }
}

/// Point-in-time view of the controller state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Current phase
    pub phase: SessionPhase,
    /// Current generation; bumped by each accepted connect
    pub generation: u64,
    /// Display name of the current or last session
    pub session_name: Option<String>,
    /// Display name of the active platform profile
    pub profile_name: Option<String>,
    /// Engine handle, while this controller holds one
    pub tunnel_handle: Option<TunnelHandle>,
}
