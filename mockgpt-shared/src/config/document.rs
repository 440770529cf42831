//! # Configuration document
//!
//! Typed, read-only view over the JSON document that drives the emulator:
//!
//! ```json
//! {
//!   "mode": "mock",
//!   "proxy_config": { "target_url": "...", "api_key": "...", "timeout": 60,
//!                     "log_requests": true, "log_responses": true,
//!                     "model": null, "enabled": false },
//!   "preset_responses": [ ... ],
//!   "mock_config": { "default_content": "...", "default_model": "gpt-3.5-turbo" }
//! }
//! ```
//!
//! The document is owned by a configuration store and re-read on every request;
//! a parsed [`ConfigDocument`] is a snapshot and is never written back.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MOCK_CONTENT: &str = "This is a simulated response from the mock OpenAI API.";
pub const DEFAULT_MOCK_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_PROXY_TIMEOUT_SECS: f64 = 60.0;
pub const MAX_PROXY_TIMEOUT_SECS: f64 = 86_400.0;

/// Operating mode of the completion endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Mode {
    #[default]
    Mock,
    Proxy,
}

impl Mode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Proxy => "proxy",
        }
    }
}

// Anything other than "proxy" falls back to mock.
impl From<String> for Mode {
    fn from(value: String) -> Self {
        if value == "proxy" {
            Self::Proxy
        } else {
            Self::Mock
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream forwarding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub target_url: Option<String>,
    pub api_key: Option<String>,
    /// Seconds; fractional values are allowed.
    pub timeout: f64,
    pub log_requests: bool,
    pub log_responses: bool,
    /// Replaces the request's `model` before forwarding when set.
    pub model: Option<String>,
    pub enabled: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            target_url: None,
            api_key: None,
            timeout: DEFAULT_PROXY_TIMEOUT_SECS,
            log_requests: true,
            log_responses: true,
            model: None,
            enabled: false,
        }
    }
}

impl ProxyConfig {
    /// Per-request upstream timeout; non-positive or non-finite values use the
    /// default and anything longer than a day is capped.
    #[must_use]
    pub fn timeout_duration(&self) -> Duration {
        if self.timeout.is_finite() && self.timeout > 0.0 {
            Duration::from_secs_f64(self.timeout.min(MAX_PROXY_TIMEOUT_SECS))
        } else {
            Duration::from_secs_f64(DEFAULT_PROXY_TIMEOUT_SECS)
        }
    }

    /// The model override, ignoring empty strings.
    #[must_use]
    pub fn model_override(&self) -> Option<&str> {
        self.model.as_deref().filter(|model| !model.is_empty())
    }
}

/// Fallbacks used when synthesizing completions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    pub default_content: String,
    pub default_model: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            default_content: DEFAULT_MOCK_CONTENT.to_string(),
            default_model: DEFAULT_MOCK_MODEL.to_string(),
        }
    }
}

/// Conditions a request must satisfy for a preset to apply.
///
/// Every present field must hold; unknown keys in the document are ignored.
/// Values are kept as raw JSON: a condition of the wrong type (or `null`) is
/// still a condition, it just never matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchConditions {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub model: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub stream: Option<Value>,
    /// Messages that must each appear verbatim in the request.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub messages: Option<Value>,
}

// Distinguishes an explicit `null` from an absent key.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// A configured canned reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Label used in logs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_conditions: Option<MatchConditions>,
    /// Returned verbatim for a matching request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Replayed in order for a matching streaming request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_response_chunks: Option<Vec<Value>>,
}

impl Preset {
    #[must_use]
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// The literal response, if one is configured and not `null`.
    #[must_use]
    pub fn literal_response(&self) -> Option<&Value> {
        self.response.as_ref().filter(|value| !value.is_null())
    }

    /// The chunk sequence, if one is configured and non-empty.
    #[must_use]
    pub fn stream_chunks(&self) -> Option<&[Value]> {
        self.stream_response_chunks
            .as_deref()
            .filter(|chunks| !chunks.is_empty())
    }
}

/// Snapshot of the configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    pub mode: Mode,
    pub proxy_config: ProxyConfig,
    #[serde(deserialize_with = "usable_presets")]
    pub preset_responses: Vec<Preset>,
    pub mock_config: MockConfig,
}

// A malformed preset is dropped on its own instead of invalidating the document.
fn usable_presets<'de, D>(deserializer: D) -> Result<Vec<Preset>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<Value>::deserialize(deserializer)?;
    let mut presets = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Preset>(entry) {
            Ok(preset) => presets.push(preset),
            Err(err) => warn!(index, error = %err, "skipping malformed preset"),
        }
    }
    Ok(presets)
}

impl ConfigDocument {
    /// Parses a raw document.
    ///
    /// # Errors
    /// Returns an error if the value does not have the document's shape.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub const fn proxy(&self) -> &ProxyConfig {
        &self.proxy_config
    }

    #[must_use]
    pub fn presets(&self) -> &[Preset] {
        &self.preset_responses
    }

    #[must_use]
    pub const fn mock_defaults(&self) -> &MockConfig {
        &self.mock_config
    }

    /// Requests are forwarded only when proxy mode is selected and enabled.
    #[must_use]
    pub const fn proxy_active(&self) -> bool {
        matches!(self.mode, Mode::Proxy) && self.proxy_config.enabled
    }
}
