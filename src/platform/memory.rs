//! In-memory tunnel provider
//!
//! Stands in for the operating system's VPN subsystem in dry runs and
//! tests: keeps profiles in a vector, counts calls, injects failures on
//! demand and, when auto-connect is on, plays the status sequence a real
//! platform reports for start and stop.

use super::{
    ProfileStatus, StatusNotification, StatusSender, TunnelProfile, TunnelProvider, TunnelStart,
};
use crate::error::ProfileError;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Number of calls made to each provider operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallLog {
    /// `list_profiles` calls
    pub list: usize,
    /// `save_profile` calls
    pub save: usize,
    /// `load_profile` calls
    pub load: usize,
    /// `start_profile` calls
    pub start: usize,
    /// `stop_profile` calls
    pub stop: usize,
}

#[derive(Default)]
struct MemoryState {
    profiles: Vec<TunnelProfile>,
    next_record: u64,
    sender: Option<StatusSender>,
    generation: Option<u64>,
    calls: CallLog,
    list_error: Option<ProfileError>,
    save_error: Option<ProfileError>,
    load_error: Option<ProfileError>,
    start_error: Option<ProfileError>,
    auto_connect: bool,
    tunnel_fd: Option<i32>,
}

impl MemoryState {
    fn find(&self, profile: &TunnelProfile) -> Option<usize> {
        match profile.record_id {
            Some(id) => self.profiles.iter().position(|p| p.record_id == Some(id)),
            None => self
                .profiles
                .iter()
                .position(|p| p.identifier == profile.identifier),
        }
    }

    fn transition(&mut self, index: usize, status: ProfileStatus) {
        self.profiles[index].status = status;
        let notification = StatusNotification {
            identifier: self.profiles[index].identifier.clone(),
            generation: self.generation,
            status,
        };
        self.send(notification);
    }

    fn send(&mut self, notification: StatusNotification) -> bool {
        match &self.sender {
            Some(sender) => sender.send(notification).is_ok(),
            None => false,
        }
    }
}

/// Tunnel provider backed by process memory
pub struct InMemoryProvider {
    state: Mutex<MemoryState>,
}

impl InMemoryProvider {
    /// Empty store; start and stop play the connect and disconnect sequences
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_record: 1,
                auto_connect: true,
                ..Default::default()
            }),
        }
    }

    /// Store pre-populated with `profiles`
    pub fn with_profiles(profiles: Vec<TunnelProfile>) -> Self {
        let provider = Self::new();
        {
            let mut state = provider.state();
            for mut profile in profiles {
                if profile.record_id.is_none() {
                    profile.record_id = Some(state.next_record);
                    state.next_record += 1;
                }
                state.profiles.push(profile);
            }
        }
        provider
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Play status sequences on start and stop (on by default)
    pub fn set_auto_connect(&self, enabled: bool) {
        self.state().auto_connect = enabled;
    }

    /// Descriptor returned from `start_profile`
    pub fn set_tunnel_fd(&self, fd: Option<i32>) {
        self.state().tunnel_fd = fd;
    }

    /// Make `list_profiles` fail until cleared
    pub fn fail_list(&self, error: Option<ProfileError>) {
        self.state().list_error = error;
    }

    /// Make `save_profile` fail until cleared
    pub fn fail_save(&self, error: Option<ProfileError>) {
        self.state().save_error = error;
    }

    /// Make `load_profile` fail until cleared
    pub fn fail_load(&self, error: Option<ProfileError>) {
        self.state().load_error = error;
    }

    /// Make `start_profile` fail until cleared
    pub fn fail_start(&self, error: Option<ProfileError>) {
        self.state().start_error = error;
    }

    /// Calls made so far
    pub fn calls(&self) -> CallLog {
        self.state().calls
    }

    /// Snapshot of stored profiles
    pub fn profiles(&self) -> Vec<TunnelProfile> {
        self.state().profiles.clone()
    }

    /// Generation of the last start request
    pub fn last_generation(&self) -> Option<u64> {
        self.state().generation
    }

    /// Push a notification as-is; returns false if nobody is subscribed
    pub fn notify(&self, notification: StatusNotification) -> bool {
        self.state().send(notification)
    }

    /// Change the stored status of the first profile with `identifier` and
    /// report it with `generation`
    pub fn set_status(&self, identifier: &str, status: ProfileStatus, generation: Option<u64>) {
        let mut state = self.state();
        if let Some(profile) = state.profiles.iter_mut().find(|p| p.identifier == identifier) {
            profile.status = status;
        }
        state.send(StatusNotification {
            identifier: identifier.to_string(),
            generation,
            status,
        });
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TunnelProvider for InMemoryProvider {
    async fn list_profiles(&self) -> Result<Vec<TunnelProfile>, ProfileError> {
        let mut state = self.state();
        state.calls.list += 1;
        if let Some(err) = state.list_error.clone() {
            return Err(err);
        }
        Ok(state.profiles.clone())
    }

    async fn save_profile(&self, profile: &TunnelProfile) -> Result<TunnelProfile, ProfileError> {
        let mut state = self.state();
        state.calls.save += 1;
        if let Some(err) = state.save_error.clone() {
            return Err(err);
        }

        let existing = profile
            .record_id
            .and_then(|id| state.profiles.iter().position(|p| p.record_id == Some(id)));

        let stored = match existing {
            Some(index) => {
                let status = state.profiles[index].status;
                let slot = &mut state.profiles[index];
                *slot = profile.clone();
                slot.status = status;
                slot.clone()
            }
            None => {
                let mut stored = profile.clone();
                stored.record_id = Some(state.next_record);
                stored.status = ProfileStatus::Disconnected;
                state.next_record += 1;
                state.profiles.push(stored.clone());
                stored
            }
        };
        debug!("Saved profile {:?} ({})", stored.record_id, stored.display_name);
        Ok(stored)
    }

    async fn load_profile(&self, profile: &TunnelProfile) -> Result<TunnelProfile, ProfileError> {
        let mut state = self.state();
        state.calls.load += 1;
        if let Some(err) = state.load_error.clone() {
            return Err(err);
        }
        match state.find(profile) {
            Some(index) => Ok(state.profiles[index].clone()),
            None => Err(ProfileError::StoreUnavailable(format!(
                "profile '{}' not found",
                profile.display_name
            ))),
        }
    }

    async fn start_profile(
        &self,
        profile: &TunnelProfile,
        generation: u64,
    ) -> Result<TunnelStart, ProfileError> {
        let mut state = self.state();
        state.calls.start += 1;
        if let Some(err) = state.start_error.clone() {
            return Err(err);
        }
        let index = state.find(profile).ok_or_else(|| {
            ProfileError::StartRejected(format!("profile '{}' not found", profile.display_name))
        })?;

        state.generation = Some(generation);
        if state.auto_connect {
            state.transition(index, ProfileStatus::Connecting);
            state.transition(index, ProfileStatus::Connected);
        }
        Ok(TunnelStart {
            tunnel_fd: state.tunnel_fd,
        })
    }

    fn stop_profile(&self, profile: &TunnelProfile) {
        let mut state = self.state();
        state.calls.stop += 1;
        let Some(index) = state.find(profile) else {
            return;
        };
        if state.auto_connect
            && !matches!(
                state.profiles[index].status,
                ProfileStatus::Disconnected | ProfileStatus::Invalid
            )
        {
            state.transition(index, ProfileStatus::Disconnecting);
            state.transition(index, ProfileStatus::Disconnected);
        }
    }

    fn subscribe_status_changes(&self, sender: StatusSender) {
        self.state().sender = Some(sender);
    }
}
