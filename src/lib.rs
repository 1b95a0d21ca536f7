//! wg-session: WireGuard VPN session controller
//!
//! This library lets a host application bring a WireGuard tunnel up and
//! down from raw wg-quick configuration text, observe its status, and
//! receive lifecycle events, on top of an operating-system VPN subsystem
//! that owns persisted profiles and a userspace engine that moves packets.
//!
//! # Architecture
//!
//! The host talks only to [`SessionController`]. The controller parses the
//! configuration, persists it through the [`ProfileStore`], asks the
//! platform [`TunnelProvider`] to start the tunnel, configures the engine
//! through the [`TunnelEngineAdapter`], and reconciles the session phase
//! with platform status notifications. Lifecycle changes reach the host
//! through the [`EventBridge`].
//!
//! # Modules
//!
//! - `config`: wg-quick parsing, derived network settings, settings file
//! - `wireguard`: key material, engine settings rendering, engine adapter
//! - `platform`: platform tunnel provider interface and in-memory provider
//! - `profile`: persisted profile management
//! - `session`: the session controller state machine
//! - `events`: lifecycle event delivery to host listeners
//! - `error`: Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod events;
pub mod platform;
pub mod profile;
pub mod session;
pub mod wireguard;

// Re-export commonly used types
pub use config::{Settings, TunnelConfig};
pub use error::{ConfigError, EngineError, ProfileError, Result, SessionError};
pub use events::{EventBridge, EventKind, SessionEvent};
pub use platform::{TunnelProfile, TunnelProvider};
pub use profile::ProfileStore;
pub use session::{SessionController, SessionPhase, SessionSnapshot};
pub use wireguard::{TunnelEngine, TunnelEngineAdapter};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
