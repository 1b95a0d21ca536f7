//! In-process engine used for dry runs
//!
//! Accepts UAPI settings, hands out increasing handles and logs through the
//! registered callback. No packets are moved.

use super::engine::{LogLevel, LogSink, TunnelEngine};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, RwLock};

/// `EINVAL`, returned for settings without a private key
const INVALID_SETTINGS: i32 = -22;

/// Loopback tunnel engine
#[derive(Default)]
pub struct LoopbackEngine {
    next_handle: AtomicI32,
    running: Mutex<HashSet<i32>>,
    logger: RwLock<Option<LogSink>>,
}

impl LoopbackEngine {
    /// Create a loopback engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tunnels currently up
    pub fn running(&self) -> usize {
        self.running.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn log(&self, level: LogLevel, message: String) {
        let logger = self.logger.read().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(logger) = logger {
            logger(level, message);
        }
    }
}

impl TunnelEngine for LoopbackEngine {
    fn version(&self) -> String {
        format!("loopback-{}", env!("CARGO_PKG_VERSION"))
    }

    fn turn_on(&self, settings: &str, tunnel_fd: Option<i32>) -> i32 {
        if !settings.lines().any(|l| l.starts_with("private_key=")) {
            self.log(LogLevel::Error, "Settings carry no private key".to_string());
            return INVALID_SETTINGS;
        }

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle);

        let peers = settings.lines().filter(|l| l.starts_with("public_key=")).count();
        self.log(
            LogLevel::Verbose,
            format!(
                "Interface up (handle {}, fd {:?}, {} peer(s))",
                handle, tunnel_fd, peers
            ),
        );
        handle
    }

    fn turn_off(&self, handle: i32) {
        if self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle)
        {
            self.log(LogLevel::Verbose, format!("Interface down (handle {})", handle));
        }
    }

    fn set_logger(&self, logger: Option<LogSink>) {
        *self.logger.write().unwrap_or_else(|e| e.into_inner()) = logger;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_and_rejection() {
        let engine = LoopbackEngine::new();
        assert_eq!(engine.turn_on("listen_port=1\n", None), INVALID_SETTINGS);

        let a = engine.turn_on("private_key=00\n", None);
        let b = engine.turn_on("private_key=00\n", Some(4));
        assert!(a >= 0 && b > a);
        assert_eq!(engine.running(), 2);

        engine.turn_off(a);
        engine.turn_off(a);
        assert_eq!(engine.running(), 1);
    }

    #[test]
    fn test_version() {
        assert!(LoopbackEngine::new().version().starts_with("loopback-"));
    }
}
