//! The boundary the rest of the application talks to.
//!
//! The settings form and the inference-invocation code consume this trait;
//! neither touches the store or the validator directly. Provider names
//! arrive here as free text (the UI speaks strings) and are parsed into
//! the closed enum before anything else runs.

use {
    async_trait::async_trait,
    tokio::sync::broadcast,
    tracing::debug,
};

use {
    glint_keycheck::{KeyValidator, Reason, Verdict},
    glint_policy::{Provider, ProviderCatalog, detect_provider, provider_catalogs},
    glint_settings::{Settings, SettingsPatch, SettingsStore},
};

/// Application-facing settings and validation surface.
///
/// Opening external links is deliberately absent: that is the host shell's
/// concern, not the configuration core's.
#[async_trait]
pub trait SettingsService: Send + Sync {
    /// The current configuration (defaults if nothing is persisted yet).
    fn config(&self) -> Settings;

    /// Apply a partial update and return the resulting configuration.
    fn update_config(&self, patch: SettingsPatch) -> Settings;

    /// Check a credential against a provider, inferring the provider from
    /// the credential's shape when `provider` is absent. Read-only: no
    /// stored state changes, whatever the verdict.
    async fn test_credential(&self, credential: &str, provider: Option<&str>) -> Verdict;

    /// Subscribe to configuration changes; the payload is the full new
    /// snapshot.
    fn subscribe(&self) -> broadcast::Receiver<Settings>;

    /// The provider catalogs, for rendering provider and model pickers.
    fn providers(&self) -> &'static [ProviderCatalog];
}

/// Production implementation: one store, one validator.
pub struct LiveSettingsService {
    store: SettingsStore,
    validator: KeyValidator,
}

impl LiveSettingsService {
    pub fn new(store: SettingsStore) -> Self {
        Self {
            store,
            validator: KeyValidator::new(),
        }
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }
}

#[async_trait]
impl SettingsService for LiveSettingsService {
    fn config(&self) -> Settings {
        self.store.load()
    }

    fn update_config(&self, patch: SettingsPatch) -> Settings {
        self.store.update(patch)
    }

    async fn test_credential(&self, credential: &str, provider: Option<&str>) -> Verdict {
        let requested = match provider.map(str::trim).filter(|tag| !tag.is_empty()) {
            Some(tag) => match Provider::parse(tag) {
                Some(provider) => Some(provider),
                None => {
                    return Verdict::rejected(
                        Reason::UnknownProvider,
                        format!("Unknown provider \"{tag}\"."),
                    );
                },
            },
            None => None,
        };
        let resolved = requested.unwrap_or_else(|| detect_provider(credential));
        debug!(provider = %resolved, inferred = requested.is_none(), "testing credential");

        if resolved == Provider::LocalModel {
            // The probe targets whatever base URL the user configured, not
            // a vendor endpoint.
            let base_url = self.store.effective_local_base_url();
            return self.validator.validate_local(&base_url).await;
        }
        self.validator.validate(credential, Some(resolved)).await
    }

    fn subscribe(&self) -> broadcast::Receiver<Settings> {
        self.store.subscribe()
    }

    fn providers(&self) -> &'static [ProviderCatalog] {
        provider_catalogs()
    }
}
