//! Settings schema types. All structs use `#[serde(rename_all =
//! "camelCase")]` so the JSON file keeps its stable camelCase keys while
//! Rust code uses snake_case fields.

use {
    serde::{Deserialize, Serialize},
    tracing::warn,
};

use glint_policy::{Provider, defaults_for, normalize_local_base_url, sanitize_model};

pub const DEFAULT_PROVIDER: Provider = Provider::Openai;
pub const DEFAULT_LANGUAGE: &str = "python";
pub const DEFAULT_OPACITY: f64 = 1.0;
pub const MIN_OPACITY: f64 = 0.1;
pub const MAX_OPACITY: f64 = 1.0;

/// Clamp a requested window opacity into the supported range. Non-finite
/// input (a hand-edited file can contain anything) resets to the default.
pub fn clamp_opacity(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(MIN_OPACITY, MAX_OPACITY)
    } else {
        DEFAULT_OPACITY
    }
}

/// The full persisted configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_key: String,
    #[serde(deserialize_with = "lenient_provider")]
    pub api_provider: Provider,
    pub extraction_model: String,
    pub solution_model: String,
    pub debugging_model: String,
    pub language: String,
    pub opacity: f64,
    /// Base URL of a locally hosted server. Only meaningful when
    /// `api_provider` is `local-model`; see [`Settings::effective_local_base_url`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_base_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let defaults = defaults_for(DEFAULT_PROVIDER);
        Self {
            api_key: String::new(),
            api_provider: DEFAULT_PROVIDER,
            extraction_model: defaults.extraction.to_string(),
            solution_model: defaults.solution.to_string(),
            debugging_model: defaults.debugging.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            opacity: DEFAULT_OPACITY,
            local_base_url: None,
        }
    }
}

impl Settings {
    /// True when the configuration carries a usable credential. Local
    /// servers need none, so a local-model configuration always qualifies.
    pub fn has_credential(&self) -> bool {
        self.api_provider == Provider::LocalModel || !self.api_key.trim().is_empty()
    }

    /// The local base URL to actually probe: the configured value or the
    /// loopback default, normalized onto the `/v1` path.
    pub fn effective_local_base_url(&self) -> String {
        normalize_local_base_url(self.local_base_url.as_deref())
    }

    /// Re-establish the model and opacity invariants in place. Idempotent;
    /// applied after every load and merge so no caller ever observes an
    /// out-of-policy value.
    pub(crate) fn sanitize(&mut self) {
        let provider = self.api_provider;
        for model in [
            &mut self.extraction_model,
            &mut self.solution_model,
            &mut self.debugging_model,
        ] {
            *model = sanitize_model(provider, model);
        }
        self.opacity = clamp_opacity(self.opacity);
    }
}

/// A stored provider tag outside the known set falls back to the default
/// provider rather than poisoning the whole document.
fn lenient_provider<'de, D>(deserializer: D) -> Result<Provider, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let tag = String::deserialize(deserializer)?;
    Ok(Provider::parse(&tag).unwrap_or_else(|| {
        warn!(provider = %tag, "unrecognized provider in settings file, using default");
        DEFAULT_PROVIDER
    }))
}

/// A partial update. Absent fields keep their prior values; the merge is
/// shallow and field-by-field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub api_key: Option<String>,
    pub api_provider: Option<Provider>,
    pub extraction_model: Option<String>,
    pub solution_model: Option<String>,
    pub debugging_model: Option<String>,
    pub language: Option<String>,
    pub opacity: Option<f64>,
    pub local_base_url: Option<String>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_policy() {
        let mut settings = Settings::default();
        let before = settings.clone();
        settings.sanitize();
        assert_eq!(settings, before, "defaults must already satisfy the policy");
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert!(json.get("apiKey").is_some());
        assert!(json.get("apiProvider").is_some());
        assert!(json.get("extractionModel").is_some());
        // Absent local base URL is omitted, not null.
        assert!(json.get("localBaseUrl").is_none());
    }

    #[test]
    fn unknown_provider_tag_falls_back_without_losing_fields() {
        let parsed: Settings = serde_json::from_str(
            r#"{"apiProvider": "copilot", "language": "rust", "opacity": 0.7}"#,
        )
        .unwrap();
        assert_eq!(parsed.api_provider, DEFAULT_PROVIDER);
        assert_eq!(parsed.language, "rust");
        assert_eq!(parsed.opacity, 0.7);
    }

    #[test]
    fn sanitize_corrects_out_of_catalog_models() {
        let mut settings = Settings {
            solution_model: "not-a-real-model".into(),
            ..Settings::default()
        };
        settings.sanitize();
        assert_eq!(settings.solution_model, "gpt-4o");
    }

    #[test]
    fn sanitize_leaves_open_catalogs_alone() {
        let mut settings = Settings {
            api_provider: Provider::Openrouter,
            extraction_model: "anything/goes:here".into(),
            solution_model: "anything/goes:here".into(),
            debugging_model: "anything/goes:here".into(),
            ..Settings::default()
        };
        settings.sanitize();
        assert_eq!(settings.extraction_model, "anything/goes:here");
    }

    #[test]
    fn clamp_opacity_bounds() {
        assert_eq!(clamp_opacity(-1.0), MIN_OPACITY);
        assert_eq!(clamp_opacity(5.0), MAX_OPACITY);
        assert_eq!(clamp_opacity(0.5), 0.5);
        assert_eq!(clamp_opacity(f64::NAN), DEFAULT_OPACITY);
    }

    #[test]
    fn has_credential_rules() {
        let mut settings = Settings::default();
        assert!(!settings.has_credential());
        settings.api_key = "   ".into();
        assert!(!settings.has_credential());
        settings.api_key = "sk-something".into();
        assert!(settings.has_credential());

        let local = Settings {
            api_provider: Provider::LocalModel,
            ..Settings::default()
        };
        assert!(local.has_credential(), "local-model never needs a key");
    }

    #[test]
    fn effective_local_base_url_defaults_and_normalizes() {
        let mut settings = Settings::default();
        assert_eq!(settings.effective_local_base_url(), "http://127.0.0.1:11434/v1");
        settings.local_base_url = Some("http://192.168.1.20:8080".into());
        assert_eq!(settings.effective_local_base_url(), "http://192.168.1.20:8080/v1");
    }

    #[test]
    fn patch_parses_from_camel_case() {
        let patch: SettingsPatch =
            serde_json::from_str(r#"{"apiKey": "sk-x", "solutionModel": "gpt-4.1"}"#).unwrap();
        assert_eq!(patch.api_key.as_deref(), Some("sk-x"));
        assert_eq!(patch.solution_model.as_deref(), Some("gpt-4.1"));
        assert!(patch.api_provider.is_none());
    }
}
