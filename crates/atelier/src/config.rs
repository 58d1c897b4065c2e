//! Runtime settings.
//!
//! Binaries parse their command line (with environment fallbacks) and map it
//! onto these plain structs; the library never reads arguments itself.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Environment variable holding the Anthropic API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
/// Environment variable overriding the Anthropic API base URL.
pub const BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";

/// Default model used for turns.
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";
/// Default completion size bound.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
/// Default Anthropic API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No API key is configured.
    #[error("Anthropic client not configured: {API_KEY_ENV} is not set")]
    MissingApiKey,
}

/// Settings shared by the front ends.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding one subdirectory per session.
    pub workspaces_dir: PathBuf,
    /// Model identifier sent to the provider.
    pub model: String,
    /// Upper bound on completion tokens per turn.
    pub max_tokens: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspaces_dir: PathBuf::from("workspaces"),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Credentials and endpoint for the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicConfig {
    /// API key sent as `x-api-key`.
    pub api_key: String,
    /// Base URL, without the `/v1/messages` suffix.
    pub base_url: String,
    /// Timeout for a single completion request.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl AnthropicConfig {
    /// Create a config for `api_key` with the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }

    /// Read the key (and optional base URL) from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = env::var(BASE_URL_ENV) {
            config.base_url = base_url;
        }
        Ok(config)
    }

    /// Override the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
