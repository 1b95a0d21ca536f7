//! Profile store over the platform preference store

use crate::config::ProfileSettings;
use crate::error::ProfileError;
use crate::platform::{TunnelProfile, TunnelProvider};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Finds, creates and updates this application's tunnel profile
///
/// A profile is "ours" when its provider identifier equals the
/// controller's configured identifier. Each connect reuses that profile
/// rather than creating another one.
#[derive(Clone)]
pub struct ProfileStore {
    provider: Arc<dyn TunnelProvider>,
    max_payload_bytes: usize,
}

impl ProfileStore {
    /// Create a store over `provider`
    pub fn new(provider: Arc<dyn TunnelProvider>, settings: &ProfileSettings) -> Self {
        Self {
            provider,
            max_payload_bytes: settings.max_payload_bytes,
        }
    }

    /// The first profile whose identifier matches, if any
    pub async fn find_own_profile(
        &self,
        identifier: &str,
    ) -> Result<Option<TunnelProfile>, ProfileError> {
        let profiles = self.provider.list_profiles().await?;
        let mut own = profiles.into_iter().filter(|p| p.identifier == identifier);

        let first = own.next();
        let extra = own.count();
        if extra > 0 {
            warn!(
                "Found {} profiles for '{}'; using the first",
                extra + 1,
                identifier
            );
        }
        Ok(first)
    }

    /// Reuse or create our profile, set its name and payload, and persist it
    pub async fn create_or_update(
        &self,
        identifier: &str,
        display_name: &str,
        config_text: &str,
    ) -> Result<TunnelProfile, ProfileError> {
        let payload = self.encode_payload(config_text)?;

        let profile = match self.find_own_profile(identifier).await? {
            Some(mut existing) => {
                debug!("Updating existing profile {:?}", existing.record_id);
                existing.display_name = display_name.to_string();
                existing.config_payload = payload;
                existing
            }
            None => {
                debug!("Creating profile for '{}'", identifier);
                TunnelProfile::new(identifier, display_name, payload)
            }
        };

        let saved = self.provider.save_profile(&profile).await?;
        info!("Saved tunnel profile '{}'", saved.display_name);
        Ok(saved)
    }

    /// Reload a profile after saving so that it reflects the platform copy
    pub async fn reload(&self, profile: &TunnelProfile) -> Result<TunnelProfile, ProfileError> {
        self.provider.load_profile(profile).await
    }

    fn encode_payload(&self, config_text: &str) -> Result<Vec<u8>, ProfileError> {
        if config_text.contains('\0') {
            return Err(ProfileError::EncodingFailed(
                "configuration text contains a NUL character".to_string(),
            ));
        }
        if config_text.len() > self.max_payload_bytes {
            return Err(ProfileError::EncodingFailed(format!(
                "configuration text is {} bytes (limit {})",
                config_text.len(),
                self.max_payload_bytes
            )));
        }
        Ok(config_text.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore")
            .field("max_payload_bytes", &self.max_payload_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{InMemoryProvider, ProfileStatus};

    const ID: &str = "com.example.vpn";

    fn store_over(provider: &Arc<InMemoryProvider>) -> ProfileStore {
        ProfileStore::new(provider.clone(), &ProfileSettings::default())
    }

    #[tokio::test]
    async fn test_create_then_update_reuses_profile() {
        let provider = Arc::new(InMemoryProvider::new());
        let store = store_over(&provider);

        let first = store.create_or_update(ID, "A", "one").await.unwrap();
        let second = store.create_or_update(ID, "B", "two").await.unwrap();

        assert_eq!(first.record_id, second.record_id);
        let profiles = provider.profiles();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].display_name, "B");
        assert_eq!(profiles[0].config_text(), Some("two"));
        assert_eq!(provider.calls().save, 2);
    }

    #[tokio::test]
    async fn test_find_ignores_foreign_profiles() {
        let provider = Arc::new(InMemoryProvider::with_profiles(vec![TunnelProfile::new(
            "org.other.vpn",
            "Other",
            Vec::new(),
        )]));
        let store = store_over(&provider);
        assert_eq!(store.find_own_profile(ID).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_picks_first_of_duplicates() {
        let mut a = TunnelProfile::new(ID, "First", Vec::new());
        a.status = ProfileStatus::Connected;
        let b = TunnelProfile::new(ID, "Second", Vec::new());
        let provider = Arc::new(InMemoryProvider::with_profiles(vec![a, b]));
        let store = store_over(&provider);

        let found = store.find_own_profile(ID).await.unwrap().unwrap();
        assert_eq!(found.display_name, "First");
    }

    #[tokio::test]
    async fn test_encoding_failures_skip_save() {
        let provider = Arc::new(InMemoryProvider::new());
        let store = ProfileStore::new(
            provider.clone(),
            &ProfileSettings {
                max_payload_bytes: 8,
            },
        );

        assert!(matches!(
            store.create_or_update(ID, "A", "a\0b").await,
            Err(ProfileError::EncodingFailed(_))
        ));
        assert!(matches!(
            store.create_or_update(ID, "A", "longer than eight").await,
            Err(ProfileError::EncodingFailed(_))
        ));
        assert_eq!(provider.calls().save, 0);
        assert_eq!(provider.calls().list, 0);
    }

    #[tokio::test]
    async fn test_persist_denied_surfaces() {
        let provider = Arc::new(InMemoryProvider::new());
        provider.fail_save(Some(ProfileError::PersistDenied("user declined".to_string())));
        let store = store_over(&provider);

        assert_eq!(
            store.create_or_update(ID, "A", "x").await,
            Err(ProfileError::PersistDenied("user declined".to_string()))
        );
    }
}
