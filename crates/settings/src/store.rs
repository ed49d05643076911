//! File-backed settings store and change notification.
//!
//! All reads and writes of the persisted configuration go through
//! [`SettingsStore`]. The whole load-merge-save sequence of an update runs
//! under one mutex, so concurrent in-process updates cannot lose each
//! other's writes. Nothing guards against a second process sharing the
//! same file; one writer per machine is assumed.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use {
    thiserror::Error,
    tokio::sync::broadcast,
    tracing::{debug, warn},
};

use glint_policy::{defaults_for, detect_provider};

use crate::schema::{Settings, SettingsPatch, clamp_opacity};

const SETTINGS_FILENAME: &str = "settings.json";

/// Capacity of the change-notification channel. Subscribers that fall
/// further behind than this see a lag error on their receiver and can
/// re-read the store; the sender is never blocked.
const BROADCAST_CAPACITY: usize = 32;

/// Persistence failures. Internal only: the public store methods convert
/// these to defaults (`load`) or to logged no-ops (`save`), so callers
/// never see an error from either.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PersistError {
    fn is_missing_file(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Authoritative owner of the persisted [`Settings`].
///
/// Constructed once at process start and passed by reference (or cheaply
/// cloned) to consumers; there is no hidden global instance.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    inner: Arc<Mutex<StoreInner>>,
    tx: broadcast::Sender<Settings>,
}

#[derive(Debug)]
struct StoreInner {
    path: PathBuf,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore {
    /// Store backed by the per-user config path (`~/.config/glint/settings.json`).
    pub fn new() -> Self {
        let path = directories::ProjectDirs::from("", "", "glint")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".config/glint"))
            .join(SETTINGS_FILENAME);
        Self::with_path(path)
    }

    /// Store backed by an explicit file path.
    pub fn with_path(path: PathBuf) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(StoreInner { path })),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The backing file path.
    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    /// Subscribe to configuration changes. Each successful mutation that
    /// alters the configuration broadcasts the full new snapshot.
    pub fn subscribe(&self) -> broadcast::Receiver<Settings> {
        self.tx.subscribe()
    }

    // ── Load / save ────────────────────────────────────────────────────────

    /// Read the persisted settings. Never fails: a missing or corrupt file
    /// yields defaults, which are rewritten to disk best-effort. Model
    /// fields and opacity are sanitized before being returned.
    pub fn load(&self) -> Settings {
        let guard = self.lock();
        Self::load_or_default(&guard.path)
    }

    /// Serialize and persist `settings`. Failures are logged and swallowed;
    /// the in-memory value stays authoritative for the session.
    pub fn save(&self, settings: &Settings) {
        let guard = self.lock();
        if let Err(error) = Self::save_to_path(&guard.path, settings) {
            warn!(path = %guard.path.display(), error = %error, "failed to save settings");
        }
    }

    fn load_or_default(path: &Path) -> Settings {
        match Self::load_from_path(path) {
            Ok(settings) => settings,
            Err(error) => {
                if error.is_missing_file() {
                    debug!(path = %path.display(), "no settings file, creating defaults");
                } else {
                    warn!(
                        path = %path.display(),
                        error = %error,
                        "settings file unreadable, restoring defaults"
                    );
                }
                let defaults = Settings::default();
                if let Err(error) = Self::save_to_path(path, &defaults) {
                    warn!(path = %path.display(), error = %error, "failed to write default settings");
                }
                defaults
            },
        }
    }

    fn load_from_path(path: &Path) -> Result<Settings, PersistError> {
        let raw = std::fs::read_to_string(path)?;
        let mut settings: Settings = serde_json::from_str(&raw)?;
        settings.sanitize();
        Ok(settings)
    }

    fn save_to_path(path: &Path, settings: &Settings) -> Result<(), PersistError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(settings)?;

        // Write atomically via temp file + rename so a partial write never
        // corrupts the file the next load sees.
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_path = path.with_extension(format!("json.tmp.{nanos}"));
        std::fs::write(&temp_path, &data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600));
        }
        std::fs::rename(&temp_path, path)?;
        debug!(path = %path.display(), "saved settings");
        Ok(())
    }

    // ── Update pipeline ────────────────────────────────────────────────────

    /// Apply a partial update and return the resulting configuration.
    ///
    /// Pipeline: infer the provider from a supplied credential when none is
    /// given; on a provider switch, reset the model triple to the new
    /// provider's defaults (model fields in the same patch are discarded,
    /// the switch always wins); merge; sanitize; persist; broadcast if the
    /// result differs from the previous configuration.
    pub fn update(&self, mut patch: SettingsPatch) -> Settings {
        let guard = self.lock();
        let current = Self::load_or_default(&guard.path);

        if patch.api_provider.is_none()
            && let Some(credential) = patch.api_key.as_deref()
        {
            patch.api_provider = Some(detect_provider(credential));
        }

        let resolved = patch.api_provider.unwrap_or(current.api_provider);
        if resolved != current.api_provider {
            let defaults = defaults_for(resolved);
            debug!(
                from = %current.api_provider,
                to = %resolved,
                "provider switch, resetting model selection to provider defaults"
            );
            patch.extraction_model = Some(defaults.extraction.to_string());
            patch.solution_model = Some(defaults.solution.to_string());
            patch.debugging_model = Some(defaults.debugging.to_string());
        }

        let mut next = current.clone();
        next.api_provider = resolved;
        if let Some(api_key) = patch.api_key {
            next.api_key = api_key;
        }
        if let Some(model) = patch.extraction_model {
            next.extraction_model = model;
        }
        if let Some(model) = patch.solution_model {
            next.solution_model = model;
        }
        if let Some(model) = patch.debugging_model {
            next.debugging_model = model;
        }
        if let Some(language) = patch.language {
            next.language = language;
        }
        if let Some(opacity) = patch.opacity {
            next.opacity = opacity;
        }
        if let Some(url) = patch.local_base_url {
            // An empty string clears the override back to the default.
            next.local_base_url = if url.trim().is_empty() { None } else { Some(url) };
        }
        next.sanitize();

        if let Err(error) = Self::save_to_path(&guard.path, &next) {
            warn!(
                path = %guard.path.display(),
                error = %error,
                "failed to persist settings update, in-memory result remains authoritative"
            );
        }

        if next != current {
            // Best-effort broadcast; receivers may be gone or behind, and
            // neither can fail the update.
            let _ = self.tx.send(next.clone());
        }
        next
    }

    // ── Convenience accessors ──────────────────────────────────────────────

    pub fn opacity(&self) -> f64 {
        self.load().opacity
    }

    /// Clamps into the supported range before storing.
    pub fn set_opacity(&self, value: f64) -> Settings {
        self.update(SettingsPatch {
            opacity: Some(clamp_opacity(value)),
            ..SettingsPatch::default()
        })
    }

    pub fn language(&self) -> String {
        self.load().language
    }

    pub fn set_language(&self, language: impl Into<String>) -> Settings {
        self.update(SettingsPatch {
            language: Some(language.into()),
            ..SettingsPatch::default()
        })
    }

    /// True when the stored configuration carries a usable credential.
    pub fn has_credential(&self) -> bool {
        self.load().has_credential()
    }

    /// The local base URL validation and inference should target.
    pub fn effective_local_base_url(&self) -> String {
        self.load().effective_local_base_url()
    }
}
