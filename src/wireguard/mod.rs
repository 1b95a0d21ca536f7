//! WireGuard keys and tunnel engine
//!
//! This module handles x25519 key material, rendering of parsed
//! configurations into engine settings, and the typed adapter over the
//! userspace WireGuard engine.

mod engine;
mod keys;
mod loopback;
mod uapi;

pub use engine::{LogLevel, LogSink, TunnelEngine, TunnelEngineAdapter, TunnelHandle};
pub use keys::{PresharedKey, PrivateKey, PublicKey};
pub use loopback::LoopbackEngine;
pub use uapi::render as render_uapi;
