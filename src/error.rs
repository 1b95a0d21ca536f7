//! Error types for wg-session
//!
//! This module defines the error taxonomy used throughout the crate.
//! We use `thiserror` for the library error types and `anyhow` for
//! error propagation in the binary.
//!
//! Every error is `Clone` so that a single connect outcome can be handed
//! to every coalesced caller and to the event bridge.

use thiserror::Error;

/// Errors produced while parsing a wg-quick configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The text is structurally invalid (bad line, bad value, bad token)
    #[error("Malformed configuration: {0}")]
    Malformed(String),

    /// A required directive or section is absent
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// A CIDR prefix length exceeds the maximum for its address family
    #[error("Prefix length {prefix} exceeds maximum {max} in '{cidr}'")]
    OutOfRangePrefixLength {
        /// Offending CIDR token
        cidr: String,
        /// Parsed prefix length
        prefix: u32,
        /// Maximum allowed for the family
        max: u8,
    },

    /// A key or section matched a known name only case-insensitively
    #[error("Key '{found}' must be spelled '{expected}'")]
    CaseMismatchKey {
        /// Spelling found in the input
        found: String,
        /// Canonical spelling
        expected: String,
    },
}

/// Errors produced by the platform profile store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// The platform refused to persist the profile (permission/authorization)
    #[error("Profile persistence denied: {0}")]
    PersistDenied(String),

    /// The configuration text cannot be represented as a profile payload
    #[error("Profile payload encoding failed: {0}")]
    EncodingFailed(String),

    /// The platform preference store cannot be reached
    #[error("Profile store unavailable: {0}")]
    StoreUnavailable(String),

    /// The platform refused to start the tunnel for the profile
    #[error("Platform rejected tunnel start: {0}")]
    StartRejected(String),
}

/// Errors produced by the tunnel engine adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine returned a negative status code from turn-on
    #[error("Engine failed to start tunnel (code {0})")]
    StartFailed(i32),

    /// The handle does not refer to a running tunnel
    #[error("Invalid tunnel handle")]
    InvalidHandle,
}

/// Main error type for wg-session operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Configuration parsing errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Profile store errors
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// Tunnel engine errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Host-imposed watchdog expired
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Input validation errors (e.g. empty configuration text)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A connect attempt was superseded before it completed
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// The operation is not allowed in the current session phase
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Settings file errors
    #[error("Settings error: {0}")]
    Settings(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl SessionError {
    /// Short machine-readable kind, used in exception events
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Config(ConfigError::Malformed(_)) => "malformed",
            SessionError::Config(ConfigError::MissingRequiredField(_)) => "missing_required_field",
            SessionError::Config(ConfigError::OutOfRangePrefixLength { .. }) => {
                "out_of_range_prefix_length"
            }
            SessionError::Config(ConfigError::CaseMismatchKey { .. }) => "case_mismatch_key",
            SessionError::Profile(ProfileError::PersistDenied(_)) => "persist_denied",
            SessionError::Profile(ProfileError::EncodingFailed(_)) => "encoding_failed",
            SessionError::Profile(ProfileError::StoreUnavailable(_)) => "store_unavailable",
            SessionError::Profile(ProfileError::StartRejected(_)) => "start_rejected",
            SessionError::Engine(EngineError::StartFailed(_)) => "start_failed",
            SessionError::Engine(EngineError::InvalidHandle) => "invalid_handle",
            SessionError::Timeout(_) => "timeout",
            SessionError::InvalidInput(_) => "invalid_input",
            SessionError::Cancelled(_) => "cancelled",
            SessionError::InvalidState(_) => "invalid_state",
            SessionError::Settings(_) => "settings",
            SessionError::Io(_) => "io",
        }
    }
}

/// Result type alias using SessionError
pub type Result<T> = std::result::Result<T, SessionError>;

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        SessionError::Settings(err.to_string())
    }
}
