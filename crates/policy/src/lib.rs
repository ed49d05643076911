//! Provider policy: the closed provider set, per-provider model catalogs,
//! default model assignments, and credential-shape detection.
//!
//! Everything here is pure. Persistence lives in `glint-settings` and
//! network probes in `glint-keycheck`; both consult this crate so the
//! policy is defined in exactly one place.

use serde::{Deserialize, Serialize};

/// Credential prefix minted by Anthropic.
pub const ANTHROPIC_KEY_PREFIX: &str = "sk-ant-";
/// Credential prefix minted by OpenRouter.
pub const OPENROUTER_KEY_PREFIX: &str = "sk-or-";
/// Generic OpenAI credential prefix. Anthropic and OpenRouter keys share
/// this family, so it must be checked after the more specific prefixes.
pub const OPENAI_KEY_PREFIX: &str = "sk-";

/// Default base URL for a locally hosted OpenAI-compatible server.
pub const LOCAL_DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

// ── Provider ───────────────────────────────────────────────────────────────

/// The supported AI backends. Free-form provider strings only exist at the
/// persistence and service boundaries; everything internal dispatches on
/// this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    Openai,
    Gemini,
    Anthropic,
    Openrouter,
    LocalModel,
}

impl Provider {
    pub const ALL: [Self; 5] = [
        Self::Openai,
        Self::Gemini,
        Self::Anthropic,
        Self::Openrouter,
        Self::LocalModel,
    ];

    /// The wire tag, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
            Self::Openrouter => "openrouter",
            Self::LocalModel => "local-model",
        }
    }

    /// Parse a wire tag. Returns `None` for anything outside the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::Openai),
            "gemini" => Some(Self::Gemini),
            "anthropic" => Some(Self::Anthropic),
            "openrouter" => Some(Self::Openrouter),
            "local-model" => Some(Self::LocalModel),
            _ => None,
        }
    }

    /// Closed-catalog providers only accept allow-listed model IDs.
    /// OpenRouter and local servers mint new identifiers faster than a
    /// fixed list can track, so they accept any string.
    pub fn has_closed_catalog(self) -> bool {
        matches!(self, Self::Openai | Self::Gemini | Self::Anthropic)
    }

    /// Local servers authenticate by reachability, not by credential.
    pub fn requires_api_key(self) -> bool {
        !matches!(self, Self::LocalModel)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Catalogs ───────────────────────────────────────────────────────────────

/// Default model assignment for the three roles the assistant fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefaults {
    pub extraction: &'static str,
    pub solution: &'static str,
    pub debugging: &'static str,
}

/// Static per-provider policy, used to populate the settings form and to
/// drive sanitization and probing.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCatalog {
    pub provider: Provider,
    pub display_name: &'static str,
    pub requires_api_key: bool,
    /// Allow-listed model IDs. Empty for open-catalog providers.
    pub allowed_models: &'static [&'static str],
    /// Substituted for any out-of-catalog model on a closed provider.
    pub fallback_model: &'static str,
    pub defaults: ModelDefaults,
    /// Vendor API base for live credential probes, where one exists.
    pub default_base_url: Option<&'static str>,
}

const CATALOGS: &[ProviderCatalog] = &[
    ProviderCatalog {
        provider: Provider::Openai,
        display_name: "OpenAI",
        requires_api_key: true,
        allowed_models: &["gpt-4o", "gpt-4o-mini", "gpt-4.1", "gpt-4.1-mini", "o4-mini"],
        fallback_model: "gpt-4o",
        defaults: ModelDefaults {
            extraction: "gpt-4o",
            solution: "gpt-4o",
            debugging: "gpt-4o",
        },
        default_base_url: Some("https://api.openai.com/v1"),
    },
    ProviderCatalog {
        provider: Provider::Gemini,
        display_name: "Google Gemini",
        requires_api_key: true,
        allowed_models: &[
            "gemini-2.0-flash",
            "gemini-2.5-flash",
            "gemini-2.5-pro",
            "gemini-1.5-pro",
        ],
        fallback_model: "gemini-2.0-flash",
        defaults: ModelDefaults {
            extraction: "gemini-2.0-flash",
            solution: "gemini-2.0-flash",
            debugging: "gemini-2.0-flash",
        },
        default_base_url: None,
    },
    ProviderCatalog {
        provider: Provider::Anthropic,
        display_name: "Anthropic",
        requires_api_key: true,
        allowed_models: &[
            "claude-3-7-sonnet-20250219",
            "claude-3-5-sonnet-20241022",
            "claude-3-opus-20240229",
        ],
        fallback_model: "claude-3-7-sonnet-20250219",
        defaults: ModelDefaults {
            extraction: "claude-3-7-sonnet-20250219",
            solution: "claude-3-7-sonnet-20250219",
            debugging: "claude-3-7-sonnet-20250219",
        },
        default_base_url: None,
    },
    ProviderCatalog {
        provider: Provider::Openrouter,
        display_name: "OpenRouter",
        requires_api_key: true,
        allowed_models: &[],
        fallback_model: "openai/gpt-4o",
        defaults: ModelDefaults {
            extraction: "openai/gpt-4o",
            solution: "openai/gpt-4o",
            debugging: "openai/gpt-4o",
        },
        default_base_url: Some("https://openrouter.ai/api/v1"),
    },
    ProviderCatalog {
        provider: Provider::LocalModel,
        display_name: "Local model",
        requires_api_key: false,
        allowed_models: &[],
        // Extraction reads screenshots, so its default must be vision
        // capable; most locally hosted text models are not.
        fallback_model: "llama3.1",
        defaults: ModelDefaults {
            extraction: "llava",
            solution: "llama3.1",
            debugging: "llama3.1",
        },
        default_base_url: Some(LOCAL_DEFAULT_BASE_URL),
    },
];

/// All provider catalogs, in the order the settings form offers them.
pub fn provider_catalogs() -> &'static [ProviderCatalog] {
    CATALOGS
}

pub fn catalog_for(provider: Provider) -> &'static ProviderCatalog {
    // CATALOGS covers Provider::ALL; the tests pin that.
    CATALOGS
        .iter()
        .find(|c| c.provider == provider)
        .unwrap_or(&CATALOGS[0])
}

/// The default model triple for `provider`.
pub fn defaults_for(provider: Provider) -> ModelDefaults {
    catalog_for(provider).defaults
}

// ── Sanitization ───────────────────────────────────────────────────────────

/// Map a submitted model ID to one that is valid for `provider`.
///
/// Closed catalogs substitute the provider's fallback for anything outside
/// the allow-list; open catalogs accept any string unchanged. Idempotent.
pub fn sanitize_model(provider: Provider, model: &str) -> String {
    let catalog = catalog_for(provider);
    if !provider.has_closed_catalog() {
        return model.to_string();
    }
    if catalog.allowed_models.contains(&model) {
        model.to_string()
    } else {
        catalog.fallback_model.to_string()
    }
}

// ── Detection ──────────────────────────────────────────────────────────────

/// Infer a provider from the textual shape of a credential.
///
/// Prefix rules are ordered most-specific first: `sk-ant-` and `sk-or-`
/// both fall inside the generic `sk-` family. Anything unrecognized is
/// treated as a Gemini key, the one supported vendor without a reserved
/// prefix.
pub fn detect_provider(credential: &str) -> Provider {
    let credential = credential.trim();
    if credential.starts_with(ANTHROPIC_KEY_PREFIX) {
        Provider::Anthropic
    } else if credential.starts_with(OPENROUTER_KEY_PREFIX) {
        Provider::Openrouter
    } else if credential.starts_with(OPENAI_KEY_PREFIX) {
        Provider::Openai
    } else {
        Provider::Gemini
    }
}

/// Normalize a locally hosted server's base URL: default to the loopback
/// server when unset, trim trailing slashes, and ensure the `/v1` path the
/// OpenAI-compatible endpoints live under.
pub fn normalize_local_base_url(base_url: Option<&str>) -> String {
    let base = base_url
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(LOCAL_DEFAULT_BASE_URL);
    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}
