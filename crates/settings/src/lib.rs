//! Persisted assistant settings: schema, store, and change notification.
//!
//! Settings file: `~/.config/glint/settings.json`, a single JSON object
//! with camelCase keys. A missing, unreadable, or corrupt file is treated
//! as "no configuration yet"; defaults are returned and rewritten.

pub mod schema;
pub mod store;

pub use {
    schema::{
        DEFAULT_LANGUAGE, DEFAULT_OPACITY, DEFAULT_PROVIDER, MAX_OPACITY, MIN_OPACITY, Settings,
        SettingsPatch, clamp_opacity,
    },
    store::{PersistError, SettingsStore},
};
