//! Tunnel engine adapter
//!
//! Wraps the opaque WireGuard engine (a userspace implementation exposed
//! through turn-on/turn-off calls and integer handles) behind a typed API.
//! The adapter tracks which handles are live so that stopping a tunnel is
//! idempotent, and routes engine log lines to a host sink or to `tracing`.

use crate::error::EngineError;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, warn};

/// Engine log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Informational engine output
    Verbose,
    /// Engine error output
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Verbose => write!(f, "verbose"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Receiver for engine log lines
pub type LogSink = Arc<dyn Fn(LogLevel, String) + Send + Sync>;

/// The raw engine interface
///
/// `turn_on` returns a non-negative handle on success and a negative
/// status code on failure. The tunnel descriptor may be absent, in which
/// case the engine creates its own interface.
#[cfg_attr(test, mockall::automock)]
pub trait TunnelEngine: Send + Sync {
    /// Engine version string
    fn version(&self) -> String;

    /// Start a tunnel from UAPI settings text
    fn turn_on(&self, settings: &str, tunnel_fd: Option<i32>) -> i32;

    /// Stop the tunnel behind `handle`
    fn turn_off(&self, handle: i32);

    /// Register the engine's log callback
    fn set_logger(&self, logger: Option<LogSink>);
}

/// Handle to a running engine tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TunnelHandle(i32);

impl TunnelHandle {
    /// Raw engine handle value
    pub fn raw(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for TunnelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed wrapper over a [`TunnelEngine`]
pub struct TunnelEngineAdapter {
    engine: Arc<dyn TunnelEngine>,
    live: Mutex<HashSet<TunnelHandle>>,
    sink: Arc<RwLock<Option<LogSink>>>,
}

impl TunnelEngineAdapter {
    /// Wrap an engine and install the log forwarder
    pub fn new(engine: Arc<dyn TunnelEngine>) -> Self {
        let sink: Arc<RwLock<Option<LogSink>>> = Arc::new(RwLock::new(None));

        let forward = Arc::clone(&sink);
        engine.set_logger(Some(Arc::new(move |level: LogLevel, message: String| {
            let current = forward
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            match current {
                Some(sink) => sink(level, message),
                None => match level {
                    LogLevel::Verbose => debug!(target: "wg_session::engine", "{}", message),
                    LogLevel::Error => error!(target: "wg_session::engine", "{}", message),
                },
            }
        })));

        Self {
            engine,
            live: Mutex::new(HashSet::new()),
            sink,
        }
    }

    fn live(&self) -> MutexGuard<'_, HashSet<TunnelHandle>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Engine version string
    pub fn version(&self) -> String {
        self.engine.version()
    }

    /// Start a tunnel
    pub fn start(
        &self,
        settings: &str,
        tunnel_fd: Option<i32>,
    ) -> Result<TunnelHandle, EngineError> {
        if tunnel_fd.is_none() {
            warn!("No tunnel descriptor available; engine will create its own interface");
        }

        let code = self.engine.turn_on(settings, tunnel_fd);
        if code < 0 {
            error!("Engine refused to start tunnel (code {})", code);
            return Err(EngineError::StartFailed(code));
        }

        let handle = TunnelHandle(code);
        self.live().insert(handle);
        info!("Engine tunnel {} started", handle);
        Ok(handle)
    }

    /// Stop a tunnel; stopping an unknown or already-stopped handle is a no-op
    pub fn stop(&self, handle: TunnelHandle) {
        if !self.live().remove(&handle) {
            debug!("Engine tunnel {} already stopped", handle);
            return;
        }
        self.engine.turn_off(handle.raw());
        info!("Engine tunnel {} stopped", handle);
    }

    /// Whether `handle` refers to a running tunnel
    pub fn is_live(&self, handle: TunnelHandle) -> bool {
        self.live().contains(&handle)
    }

    /// Route engine log lines to `sink`; the latest registration wins
    pub fn set_log_sink(&self, sink: Option<LogSink>) {
        *self.sink.write().unwrap_or_else(|e| e.into_inner()) = sink;
    }
}

impl fmt::Debug for TunnelEngineAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelEngineAdapter")
            .field("live", &self.live().len())
            .finish()
    }
}
