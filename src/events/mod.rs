//! Event bridge to the embedding application
//!
//! One-directional push of session lifecycle events to host listeners.
//! Each listener receives events in the order the controller emits them.
//! There is no replay buffer: a listener attached after an event fired
//! never sees it.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Kind of lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A session started by this controller is connected
    Started,
    /// The session is disconnected
    Stopped,
    /// A session the controller did not start was found connected
    StartedBySystem,
    /// An operation failed
    Exception,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
            Self::StartedBySystem => write!(f, "started_by_system"),
            Self::Exception => write!(f, "exception"),
        }
    }
}

/// Event payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Session display name, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,

    /// Session generation the event belongs to
    pub generation: u64,

    /// Human-readable message (exceptions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Machine-readable error kind (exceptions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

/// A lifecycle event delivered to host listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Event kind
    pub kind: EventKind,
    /// Event payload
    pub payload: EventPayload,
}

impl SessionEvent {
    /// Session started by this controller
    pub fn started(session_name: impl Into<String>, generation: u64) -> Self {
        Self {
            kind: EventKind::Started,
            payload: EventPayload {
                session_name: Some(session_name.into()),
                generation,
                ..Default::default()
            },
        }
    }

    /// Session stopped
    pub fn stopped(session_name: Option<String>, generation: u64) -> Self {
        Self {
            kind: EventKind::Stopped,
            payload: EventPayload {
                session_name,
                generation,
                ..Default::default()
            },
        }
    }

    /// Session found running without a connect from this controller
    pub fn started_by_system(session_name: impl Into<String>, generation: u64) -> Self {
        Self {
            kind: EventKind::StartedBySystem,
            payload: EventPayload {
                session_name: Some(session_name.into()),
                generation,
                ..Default::default()
            },
        }
    }

    /// Operation failure
    pub fn exception(error: &SessionError, generation: u64) -> Self {
        Self {
            kind: EventKind::Exception,
            payload: EventPayload {
                session_name: None,
                generation,
                message: Some(error.to_string()),
                error_kind: Some(error.kind().to_string()),
            },
        }
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Identifier of an attached listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A listener attachment: its id and its FIFO receiver
#[derive(Debug)]
pub struct Subscription {
    /// Id to pass to [`EventBridge::unsubscribe`]
    pub id: ListenerId,
    /// Events, in emission order
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

/// Fan-out of session events to host listeners
#[derive(Debug, Default)]
pub struct EventBridge {
    listeners: Mutex<Vec<(ListenerId, mpsc::UnboundedSender<SessionEvent>)>>,
    next_id: AtomicU64,
}

impl EventBridge {
    /// Create a bridge with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(ListenerId, mpsc::UnboundedSender<SessionEvent>)>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach a listener; it receives every event emitted from now on
    pub fn subscribe(&self) -> Subscription {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners().push((id, tx));
        debug!("Event listener {:?} attached", id);
        Subscription { id, events: rx }
    }

    /// Detach a listener; returns false if it was not attached
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        let removed = listeners.len() != before;
        if removed {
            debug!("Event listener {:?} detached", id);
        }
        removed
    }

    /// Deliver an event to every attached listener
    pub fn emit(&self, event: SessionEvent) {
        let mut listeners = self.listeners();
        trace!("Emitting {} event to {} listener(s)", event.kind, listeners.len());
        // Receivers dropped by the host are pruned here
        listeners.retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        self.listeners().len()
    }
}
