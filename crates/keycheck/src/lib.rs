//! Credential validation probes, one per provider.
//!
//! Each call is a single stateless request/response with no internal
//! retries; a caller that wants retry wraps the call. Probes carry a 10
//! second client timeout so a hung endpoint cannot block the caller, and
//! dropping the returned future cancels the request.
//!
//! Two validation strengths exist and must not be conflated:
//!
//! - **Live probes** (openai, openrouter, local-model) hit the provider's
//!   model-listing endpoint, so a passing verdict means the credential is
//!   actually authorized (or, for local servers, that the service answers).
//! - **Format checks** (gemini, anthropic) only test the credential's
//!   shape. A passing verdict means "plausible", not "authorized"; there is
//!   no cheap live probe for these vendors in this design.

use std::time::Duration;

use {
    reqwest::{Client, StatusCode},
    serde::Serialize,
    tracing::{debug, warn},
};

use glint_policy::{
    ANTHROPIC_KEY_PREFIX, Provider, catalog_for, detect_provider, normalize_local_base_url,
};

/// Per-probe timeout, set on the HTTP client at construction.
pub const PROBE_TIMEOUT_SECS: u64 = 10;

/// Shortest credential either format-checked vendor issues.
const MIN_KEY_LEN: usize = 30;

// ── Verdict ────────────────────────────────────────────────────────────────

/// Why a credential was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    /// The provider recognized and refused the credential. Discarding the
    /// key is appropriate.
    InvalidCredential,
    /// The provider throttled the probe. The key may well be fine; callers
    /// should not discard it.
    RateLimited,
    /// The endpoint could not be reached or answered outside the expected
    /// protocol.
    Unreachable,
    /// The credential fails the vendor's shape rules; no request was made.
    MalformedFormat,
    /// The provider tag supplied at the service boundary is not one of the
    /// supported backends.
    UnknownProvider,
}

/// Outcome of one validation request. A value, never an error: the caller
/// decides user messaging from `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Verdict {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
            error: None,
        }
    }

    pub fn rejected(reason: Reason, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            error: Some(error.into()),
        }
    }
}

// ── Validator ──────────────────────────────────────────────────────────────

/// Stateless credential prober. Cheap to clone; holds only the HTTP client.
#[derive(Debug, Clone)]
pub struct KeyValidator {
    client: Client,
}

impl Default for KeyValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValidator {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|error| {
                warn!(error = %error, "failed to build probe client, falling back to defaults");
                Client::new()
            });
        Self { client }
    }

    /// Validate `credential` against `provider`, inferring the provider
    /// from the credential's shape when none is given. Never mutates any
    /// stored state.
    ///
    /// For `local-model` this probes the default loopback server; use
    /// [`KeyValidator::validate_local`] to target a configured base URL.
    pub async fn validate(&self, credential: &str, provider: Option<Provider>) -> Verdict {
        let provider = provider.unwrap_or_else(|| detect_provider(credential));
        debug!(provider = %provider, "validating credential");
        match provider {
            Provider::Openai | Provider::Openrouter => {
                let credential = credential.trim();
                if credential.is_empty() {
                    return Verdict::rejected(Reason::MalformedFormat, "The API key is empty.");
                }
                // Catalog invariant (pinned by glint-policy tests): both
                // remote-probe providers carry a base URL.
                let base = catalog_for(provider).default_base_url.unwrap_or_default();
                self.probe_bearer_models(base, credential).await
            },
            Provider::Gemini => check_gemini_format(credential),
            Provider::Anthropic => check_anthropic_format(credential),
            Provider::LocalModel => self.validate_local("").await,
        }
    }

    /// Probe a locally hosted OpenAI-compatible server. No credential is
    /// involved; the check is purely "does the service answer". An empty
    /// `base_url` targets the loopback default.
    pub async fn validate_local(&self, base_url: &str) -> Verdict {
        let base = normalize_local_base_url(Some(base_url));
        let url = format!("{base}/models");
        debug!(url = %url, "probing local model server");
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(error) => {
                return Verdict::rejected(
                    Reason::Unreachable,
                    format!(
                        "Local model service unreachable at {base}. Make sure the server is running. ({error})"
                    ),
                );
            },
        };
        if response.status().is_success() {
            Verdict::ok()
        } else {
            Verdict::rejected(
                Reason::Unreachable,
                format!(
                    "Local model service at {base} answered HTTP {}.",
                    response.status()
                ),
            )
        }
    }

    /// GET `{base_url}/models` with a bearer credential and classify the
    /// response. Success proves the credential; the listing content itself
    /// is ignored.
    async fn probe_bearer_models(&self, base_url: &str, credential: &str) -> Verdict {
        let url = format!("{}/models", base_url.trim_end_matches('/'));
        debug!(url = %url, "probing models endpoint");
        let response = match self.client.get(&url).bearer_auth(credential).send().await {
            Ok(response) => response,
            Err(error) if error.is_timeout() => {
                return Verdict::rejected(
                    Reason::Unreachable,
                    format!("Timed out after {PROBE_TIMEOUT_SECS}s contacting the provider."),
                );
            },
            Err(error) => {
                return Verdict::rejected(
                    Reason::Unreachable,
                    format!("Could not reach the provider. ({error})"),
                );
            },
        };

        let status = response.status();
        if status.is_success() {
            return Verdict::ok();
        }
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Verdict::rejected(
                Reason::InvalidCredential,
                "The provider rejected this API key. Check the key and try again.",
            ),
            StatusCode::TOO_MANY_REQUESTS => Verdict::rejected(
                Reason::RateLimited,
                "The provider is rate limiting this key. Wait a moment and retry.",
            ),
            _ => Verdict::rejected(
                Reason::Unreachable,
                format!("The provider answered HTTP {status} from its models endpoint."),
            ),
        }
    }
}

// ── Format checks ──────────────────────────────────────────────────────────

fn check_gemini_format(credential: &str) -> Verdict {
    let credential = credential.trim();
    if credential.len() >= MIN_KEY_LEN {
        Verdict::ok()
    } else {
        Verdict::rejected(
            Reason::MalformedFormat,
            format!("Gemini API keys are at least {MIN_KEY_LEN} characters long."),
        )
    }
}

fn check_anthropic_format(credential: &str) -> Verdict {
    let credential = credential.trim();
    if credential.starts_with(ANTHROPIC_KEY_PREFIX) && credential.len() >= MIN_KEY_LEN {
        Verdict::ok()
    } else {
        Verdict::rejected(
            Reason::MalformedFormat,
            format!("Anthropic API keys start with \"{ANTHROPIC_KEY_PREFIX}\"."),
        )
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    // ── Format checks (no network) ─────────────────────────────────────

    #[tokio::test]
    async fn anthropic_bad_format_is_rejected_without_network() {
        let verdict = KeyValidator::new()
            .validate("bad-format", Some(Provider::Anthropic))
            .await;
        assert!(!verdict.valid);
        assert_eq!(verdict.reason, Some(Reason::MalformedFormat));
    }

    #[tokio::test]
    async fn anthropic_shaped_key_passes_format_check() {
        let verdict = KeyValidator::new()
            .validate(
                "sk-ant-REDACTED",
                Some(Provider::Anthropic),
            )
            .await;
        assert!(verdict.valid);
    }

    #[tokio::test]
    async fn gemini_format_check_is_length_based() {
        let validator = KeyValidator::new();
        let short = validator.validate("AIza-too-short", Some(Provider::Gemini)).await;
        assert_eq!(short.reason, Some(Reason::MalformedFormat));

        let long = validator
            .validate("AIzaSyA0123456789abcdefghijklmnopqrstu", Some(Provider::Gemini))
            .await;
        assert!(long.valid);
    }

    #[tokio::test]
    async fn empty_key_short_circuits_remote_probe() {
        let verdict = KeyValidator::new().validate("   ", Some(Provider::Openai)).await;
        assert_eq!(verdict.reason, Some(Reason::MalformedFormat));
    }

    #[tokio::test]
    async fn detector_runs_when_no_provider_is_given() {
        // An anthropic-shaped key must route to the format check, not to a
        // live endpoint.
        let verdict = KeyValidator::new()
            .validate("sk-ant-REDACTED", None)
            .await;
        assert!(verdict.valid);
    }

    // ── HTTP classification (with mockito) ─────────────────────────────

    async fn probe(server: &mockito::ServerGuard, credential: &str) -> Verdict {
        KeyValidator::new()
            .probe_bearer_models(&server.url(), credential)
            .await
    }

    #[tokio::test]
    async fn success_response_is_valid() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/models")
            .match_header("authorization", "Bearer sk-good")
            .with_status(200)
            .with_body(r#"{"data": []}"#)
            .create_async()
            .await;

        let verdict = probe(&server, "sk-good").await;
        assert_eq!(verdict, Verdict::ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_is_invalid_credential() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/models")
            .with_status(401)
            .with_body(r#"{"error": {"message": "bad key"}}"#)
            .create_async()
            .await;

        let verdict = probe(&server, "sk-bad").await;
        assert!(!verdict.valid);
        assert_eq!(verdict.reason, Some(Reason::InvalidCredential));
    }

    #[tokio::test]
    async fn forbidden_is_invalid_credential() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/models")
            .with_status(403)
            .create_async()
            .await;

        let verdict = probe(&server, "sk-revoked").await;
        assert_eq!(verdict.reason, Some(Reason::InvalidCredential));
    }

    #[tokio::test]
    async fn rate_limit_is_distinct_from_invalid_credential() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/models")
            .with_status(429)
            .create_async()
            .await;

        let verdict = probe(&server, "sk-busy").await;
        assert!(!verdict.valid);
        assert_eq!(verdict.reason, Some(Reason::RateLimited));
    }

    #[tokio::test]
    async fn server_error_is_unreachable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/models")
            .with_status(500)
            .create_async()
            .await;

        let verdict = probe(&server, "sk-whatever").await;
        assert_eq!(verdict.reason, Some(Reason::Unreachable));
    }

    #[tokio::test]
    async fn local_probe_succeeds_against_live_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/models")
            .with_status(200)
            .with_body(r#"{"data": [{"id": "llama3.1"}]}"#)
            .create_async()
            .await;

        let verdict = KeyValidator::new().validate_local(&server.url()).await;
        assert!(verdict.valid);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn local_probe_reports_unreachable_when_nothing_listens() {
        // Reserve a port, then close it so the connect is refused.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let verdict = KeyValidator::new()
            .validate_local(&format!("http://127.0.0.1:{port}"))
            .await;
        assert!(!verdict.valid);
        assert_eq!(verdict.reason, Some(Reason::Unreachable));
        assert!(verdict.error.unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn verdict_serializes_for_the_ui() {
        let verdict = Verdict::rejected(Reason::RateLimited, "slow down");
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["reason"], "rate-limited");
        assert_eq!(json["error"], "slow down");

        let ok = serde_json::to_value(Verdict::ok()).unwrap();
        assert_eq!(ok["valid"], true);
        assert!(ok.get("reason").is_none());
    }
}
