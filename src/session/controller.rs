//! Session controller state machine
//!
//! All state lives behind one async mutex that is never held across a
//! platform or engine call. Each accepted connect bumps a generation
//! counter; a suspended step that resumes to find a different generation
//! or phase gives up with [`SessionError::Cancelled`] instead of writing
//! state. Concurrent connects share the outcome of the attempt already in
//! flight through a watch channel.

use super::{watchdog, SessionPhase, SessionSnapshot};
use crate::config::{SessionSettings, Settings, TunnelConfig};
use crate::error::{ProfileError, Result, SessionError};
use crate::events::{EventBridge, ListenerId, SessionEvent, Subscription};
use crate::platform::{ProfileStatus, StatusNotification, TunnelProfile, TunnelProvider};
use crate::profile::ProfileStore;
use crate::wireguard::{LogSink, TunnelEngine, TunnelEngineAdapter, TunnelHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

type Outcome = Option<Result<()>>;

struct SessionState {
    phase: SessionPhase,
    generation: u64,
    session_name: Option<String>,
    active_profile: Option<TunnelProfile>,
    tunnel_handle: Option<TunnelHandle>,
    pending: Option<watch::Sender<Outcome>>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            generation: 0,
            session_name: None,
            active_profile: None,
            tunnel_handle: None,
            pending: None,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

struct Inner {
    settings: SessionSettings,
    watchdog: Option<Duration>,
    store: ProfileStore,
    provider: Arc<dyn TunnelProvider>,
    engine: TunnelEngineAdapter,
    events: EventBridge,
    state: Mutex<SessionState>,
    attached: AtomicBool,
}

/// Host-facing session controller
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Create a controller over a platform provider and a tunnel engine
    pub fn new(
        settings: &Settings,
        provider: Arc<dyn TunnelProvider>,
        engine: Arc<dyn TunnelEngine>,
    ) -> Self {
        let store = ProfileStore::new(Arc::clone(&provider), &settings.profile);
        Self {
            inner: Arc::new(Inner {
                settings: settings.session.clone(),
                watchdog: settings.watchdog(),
                store,
                provider,
                engine: TunnelEngineAdapter::new(engine),
                events: EventBridge::new(),
                state: Mutex::new(SessionState::new()),
                attached: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribe to platform status changes and adopt a session that is
    /// already running for our profile
    ///
    /// Call once after construction; later calls are no-ops.
    pub async fn attach(&self) -> Result<()> {
        if self.inner.attached.swap(true, Ordering::SeqCst) {
            warn!("Controller already attached to platform notifications");
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<StatusNotification>();
        self.inner.provider.subscribe_status_changes(tx);

        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.handle_notification(notification).await;
            }
            debug!("Status notification pump stopped");
        });

        let identifier = &self.inner.settings.identifier;
        if let Some(profile) = self.inner.store.find_own_profile(identifier).await? {
            if profile.status == ProfileStatus::Connected {
                self.inner.adopt(profile).await;
            }
        }
        Ok(())
    }

    /// Bring the tunnel up from wg-quick configuration text
    ///
    /// Resolves once the tunnel start has been issued; the `Started` event
    /// follows when the platform reports the tunnel connected. Calling this
    /// while a session is starting or connected is a no-op, and calling it
    /// while another connect is in flight waits for that attempt's outcome.
    pub async fn connect(&self, config_text: &str, session_name: &str) -> Result<()> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        let in_flight = state.pending.as_ref().map(|pending| pending.subscribe());
        if let Some(outcome) = in_flight {
            debug!("Connect already in flight; waiting for its outcome");
            drop(state);
            return wait_for_outcome(outcome).await;
        }

        match state.phase {
            SessionPhase::Starting | SessionPhase::Connected => {
                info!("Session already active; reusing it");
                return Ok(());
            }
            SessionPhase::Stopping => {
                return Err(SessionError::InvalidState(
                    "Cannot connect while a disconnect is in progress".to_string(),
                ));
            }
            _ => {}
        }

        if config_text.trim().is_empty() {
            let err = SessionError::InvalidInput("Configuration text is empty".to_string());
            inner.fail(&mut state, &err);
            return Err(err);
        }

        let config = match TunnelConfig::parse(config_text) {
            Ok(config) => config,
            Err(e) => {
                let err = SessionError::from(e);
                inner.fail(&mut state, &err);
                return Err(err);
            }
        };

        let name = if session_name.trim().is_empty() {
            inner.settings.default_name.clone()
        } else {
            session_name.to_string()
        };

        state.generation += 1;
        let generation = state.generation;
        info!("Connecting session '{}' (attempt {})", name, generation);

        state.phase = SessionPhase::Saving;
        state.session_name = Some(name.clone());
        state.active_profile = None;
        let stale_handle = state.tunnel_handle.take();

        let (tx, outcome) = watch::channel(None);
        state.pending = Some(tx);
        drop(state);

        if let Some(handle) = stale_handle {
            inner.engine.stop(handle);
        }

        if let Some(after) = inner.watchdog {
            let weak = Arc::downgrade(inner);
            watchdog::arm(after, generation, move |generation| async move {
                match weak.upgrade() {
                    Some(inner) => inner.force_timeout(generation).await,
                    None => false,
                }
            });
        }

        // The attempt runs detached so that dropping this future does not
        // strand coalesced callers
        let task = Arc::clone(inner);
        let config_text = config_text.to_string();
        tokio::spawn(async move {
            let result = task.run_connect(generation, &config, &config_text, &name).await;
            task.finish_connect(generation, result).await;
        });

        wait_for_outcome(outcome).await
    }

    /// Bring the tunnel down
    ///
    /// Returns once teardown has been issued; the `Stopped` event follows
    /// when the platform reports the tunnel disconnected. With no active
    /// session this is a no-op.
    pub async fn disconnect(&self) -> Result<()> {
        self.inner.disconnect().await
    }

    /// Whether the tunnel is connected
    ///
    /// Reads the current phase. When no profile is active the platform is
    /// asked whether our profile is connected, without changing state.
    pub async fn status(&self) -> bool {
        let inner = &self.inner;
        {
            let state = inner.state.lock().await;
            if state.phase.is_connected() {
                return true;
            }
            if state.active_profile.is_some() || matches!(state.phase, SessionPhase::Failed(_)) {
                return false;
            }
        }

        match inner.store.find_own_profile(&inner.settings.identifier).await {
            Ok(Some(profile)) => profile.status == ProfileStatus::Connected,
            Ok(None) => false,
            Err(e) => {
                debug!("Status refresh failed: {}", e);
                false
            }
        }
    }

    /// Tunnel engine version string
    pub fn version(&self) -> String {
        self.inner.engine.version()
    }

    /// Attach an event listener
    pub fn subscribe(&self) -> Subscription {
        self.inner.events.subscribe()
    }

    /// Detach an event listener
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    /// Route engine log lines to `sink` instead of `tracing`
    pub fn set_log_sink(&self, sink: Option<LogSink>) {
        self.inner.engine.set_log_sink(sink);
    }

    /// Feed a platform status notification into the state machine
    ///
    /// [`attach`](Self::attach) wires this up automatically; shims that
    /// deliver notifications themselves may call it directly.
    pub async fn handle_notification(&self, notification: StatusNotification) {
        self.inner.handle_notification(notification).await;
    }

    /// Fail the attempt of `generation` with a timeout if it is still
    /// pending; returns whether it was
    pub async fn force_timeout(&self, generation: u64) -> bool {
        self.inner.force_timeout(generation).await
    }

    /// Current state
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.lock().await;
        SessionSnapshot {
            phase: state.phase.clone(),
            generation: state.generation,
            session_name: state.session_name.clone(),
            profile_name: state.active_profile.as_ref().map(|p| p.display_name.clone()),
            tunnel_handle: state.tunnel_handle,
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("identifier", &self.inner.settings.identifier)
            .finish()
    }
}

async fn wait_for_outcome(mut outcome: watch::Receiver<Outcome>) -> Result<()> {
    loop {
        let current = (*outcome.borrow_and_update()).clone();
        if let Some(result) = current {
            return result;
        }
        if outcome.changed().await.is_err() {
            let last = (*outcome.borrow()).clone();
            return last.unwrap_or_else(|| {
                Err(SessionError::Cancelled(
                    "Connect attempt ended without an outcome".to_string(),
                ))
            });
        }
    }
}

impl Inner {
    /// Record a failure of the current attempt and report it
    fn fail(&self, state: &mut SessionState, err: &SessionError) {
        error!("Session failed: {}", err);
        state.phase = SessionPhase::Failed(err.clone());
        self.events
            .emit(SessionEvent::exception(err, state.generation));
    }

    /// Move from `from` to `to` if `generation` is still current
    async fn advance(
        &self,
        generation: u64,
        from: SessionPhase,
        to: SessionPhase,
        profile: &TunnelProfile,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.is_current(generation) || state.phase != from {
            return Err(SessionError::Cancelled(format!(
                "Attempt {} superseded while {}",
                generation, from
            )));
        }
        debug!("Attempt {}: {} -> {}", generation, from, to);
        state.phase = to;
        state.active_profile = Some(profile.clone());
        Ok(())
    }

    async fn run_connect(
        &self,
        generation: u64,
        config: &TunnelConfig,
        config_text: &str,
        name: &str,
    ) -> Result<()> {
        let identifier = &self.settings.identifier;

        let saved = self
            .store
            .create_or_update(identifier, name, config_text)
            .await?;
        self.advance(generation, SessionPhase::Saving, SessionPhase::Loading, &saved)
            .await?;

        let loaded = self.store.reload(&saved).await?;
        self.advance(generation, SessionPhase::Loading, SessionPhase::Starting, &loaded)
            .await?;

        let start = self.provider.start_profile(&loaded, generation).await?;

        {
            let mut state = self.state.lock().await;
            if !state.is_current(generation) {
                return Err(SessionError::Cancelled(format!(
                    "Attempt {} superseded while starting",
                    generation
                )));
            }
            match state.phase.clone() {
                SessionPhase::Starting | SessionPhase::Connected => {}
                phase => {
                    // A disconnect or failure landed while the platform was
                    // starting; its tunnel may be up now
                    info!("Attempt {} ended while {}; stopping platform tunnel", generation, phase);
                    state.active_profile = None;
                    if phase == SessionPhase::Stopping {
                        state.phase = SessionPhase::Disconnected;
                        let name = state.session_name.clone();
                        self.events.emit(SessionEvent::stopped(name, generation));
                    }
                    drop(state);
                    self.provider.stop_profile(&loaded);
                    return Err(SessionError::Cancelled(format!(
                        "Attempt {} abandoned while starting",
                        generation
                    )));
                }
            }
        }

        let handle = match self.engine.start(&config.to_uapi(), start.tunnel_fd) {
            Ok(handle) => handle,
            Err(e) => {
                let err = SessionError::from(e);
                {
                    let mut state = self.state.lock().await;
                    if state.is_current(generation) {
                        state.active_profile = None;
                        self.fail(&mut state, &err);
                    }
                }
                // Profile stays persisted for a retry; only the platform
                // tunnel is brought down
                self.provider.stop_profile(&loaded);
                return Err(err);
            }
        };

        let mut state = self.state.lock().await;
        let current = state.is_current(generation);
        if current && matches!(state.phase, SessionPhase::Starting | SessionPhase::Connected) {
            state.tunnel_handle = Some(handle);
            return Ok(());
        }

        // Stopping already has a platform teardown in flight
        let stop_platform = current && matches!(state.phase, SessionPhase::Failed(_));
        if stop_platform {
            state.active_profile = None;
        }
        drop(state);

        self.engine.stop(handle);
        if stop_platform {
            self.provider.stop_profile(&loaded);
        }
        Err(SessionError::Cancelled(format!(
            "Attempt {} superseded before the engine came up",
            generation
        )))
    }

    async fn finish_connect(&self, generation: u64, result: Result<()>) {
        let mut state = self.state.lock().await;
        let current = state.is_current(generation);

        match &result {
            Ok(()) => debug!("Attempt {}: start issued", generation),
            Err(SessionError::Cancelled(reason)) => info!("{}", reason),
            Err(err) => {
                let live = state.phase.is_pending() || state.phase.is_connected();
                if current && live {
                    state.active_profile = None;
                    self.fail(&mut state, err);
                } else {
                    debug!("Attempt {} failed after it was superseded: {}", generation, err);
                }
            }
        }

        if current {
            if let Some(pending) = state.pending.take() {
                pending.send_replace(Some(result));
            }
        }
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let generation = state.generation;

        match state.phase.clone() {
            SessionPhase::Stopping => {
                debug!("Disconnect already in progress");
                return Ok(());
            }
            // Nothing has reached the platform tunnel yet
            SessionPhase::Saving | SessionPhase::Loading => {
                info!("Abandoning connect attempt {}", generation);
                state.phase = SessionPhase::Disconnected;
                state.active_profile = None;
                if let Some(pending) = state.pending.take() {
                    pending.send_replace(Some(Err(SessionError::Cancelled(format!(
                        "Attempt {} abandoned by disconnect",
                        generation
                    )))));
                }
                let name = state.session_name.clone();
                self.events.emit(SessionEvent::stopped(name, generation));
                return Ok(());
            }
            _ => {}
        }

        let Some(profile) = state.active_profile.clone() else {
            debug!("No active session to disconnect");
            return Ok(());
        };

        let handle = state.tunnel_handle.take();
        if let SessionPhase::Failed(_) = state.phase {
            // The platform may never report on a failed attempt
            info!("Tearing down failed session '{}'", profile.display_name);
            state.active_profile = None;
        } else {
            info!("Disconnecting session '{}'", profile.display_name);
            state.phase = SessionPhase::Stopping;
        }
        drop(state);

        self.provider.stop_profile(&profile);
        if let Some(handle) = handle {
            self.engine.stop(handle);
        }
        Ok(())
    }

    async fn force_timeout(&self, generation: u64) -> bool {
        let mut state = self.state.lock().await;
        if !state.is_current(generation) || !state.phase.is_pending() {
            return false;
        }

        let err = SessionError::Timeout(format!(
            "Attempt {} did not connect in time",
            generation
        ));
        // Only a start request can have reached the platform tunnel
        if state.phase != SessionPhase::Starting {
            state.active_profile = None;
        }
        self.fail(&mut state, &err);
        if let Some(pending) = state.pending.take() {
            pending.send_replace(Some(Err(err)));
        }
        true
    }

    /// Take over a session the platform reports connected
    async fn adopt(&self, profile: TunnelProfile) {
        let mut state = self.state.lock().await;
        let adoptable = matches!(
            state.phase,
            SessionPhase::Idle | SessionPhase::Disconnected | SessionPhase::Failed(_)
        );
        if state.pending.is_some() || !adoptable {
            debug!("Not adopting session while {}", state.phase);
            return;
        }

        info!("Adopting session '{}' started outside this controller", profile.display_name);
        let name = profile.display_name.clone();
        state.phase = SessionPhase::Connected;
        state.session_name = Some(name.clone());
        state.active_profile = Some(profile);
        self.events
            .emit(SessionEvent::started_by_system(name, state.generation));
    }

    async fn handle_notification(&self, notification: StatusNotification) {
        if notification.identifier != self.settings.identifier {
            debug!("Ignoring status of foreign profile '{}'", notification.identifier);
            return;
        }

        let mut state = self.state.lock().await;
        let generation = state.generation;
        if let Some(tagged) = notification.generation {
            if tagged != generation {
                debug!(
                    "Discarding {} for attempt {} (current {})",
                    notification.status, tagged, generation
                );
                return;
            }
        }

        debug!("Platform reports {} while {}", notification.status, state.phase);
        let mut release = None;

        match notification.status {
            ProfileStatus::Connecting | ProfileStatus::Reasserting => {}

            ProfileStatus::Connected => match state.phase.clone() {
                SessionPhase::Starting => {
                    state.phase = SessionPhase::Connected;
                    let name = state.session_name.clone().unwrap_or_default();
                    info!("Session '{}' connected", name);
                    self.events.emit(SessionEvent::started(name, generation));
                }
                SessionPhase::Idle | SessionPhase::Disconnected | SessionPhase::Failed(_)
                    if state.pending.is_none() && notification.generation.is_none() =>
                {
                    drop(state);
                    self.adopt_from_platform().await;
                    return;
                }
                // Stopping must resolve to Disconnected first
                _ => debug!("Ignoring connected status while {}", state.phase),
            },

            ProfileStatus::Disconnecting => {
                if matches!(state.phase, SessionPhase::Starting | SessionPhase::Connected) {
                    info!("Platform is tearing the session down");
                    state.phase = SessionPhase::Stopping;
                }
            }

            ProfileStatus::Disconnected => match state.phase.clone() {
                SessionPhase::Starting | SessionPhase::Connected | SessionPhase::Stopping => {
                    release = state.tunnel_handle.take();
                    state.phase = SessionPhase::Disconnected;
                    state.active_profile = None;
                    let name = state.session_name.clone();
                    info!("Session disconnected");
                    self.events.emit(SessionEvent::stopped(name, generation));
                }
                SessionPhase::Failed(_) if state.active_profile.is_some() => {
                    release = state.tunnel_handle.take();
                    state.active_profile = None;
                }
                _ => {}
            },

            ProfileStatus::Invalid => {
                if matches!(state.phase, SessionPhase::Starting | SessionPhase::Connected) {
                    release = state.tunnel_handle.take();
                    state.active_profile = None;
                    let err = SessionError::from(ProfileError::StartRejected(
                        "platform marked the profile invalid".to_string(),
                    ));
                    self.fail(&mut state, &err);
                    if let Some(pending) = state.pending.take() {
                        pending.send_replace(Some(Err(err)));
                    }
                }
            }
        }
        drop(state);

        if let Some(handle) = release {
            self.engine.stop(handle);
        }
    }

    async fn adopt_from_platform(&self) {
        match self.store.find_own_profile(&self.settings.identifier).await {
            Ok(Some(profile)) if profile.status == ProfileStatus::Connected => {
                self.adopt(profile).await
            }
            Ok(Some(profile)) => debug!("Profile is {} by now; not adopting", profile.status),
            Ok(None) => warn!("Platform reports our profile connected but it is not listed"),
            Err(e) => warn!("Cannot look up connected profile: {}", e),
        }
    }
}
