//! Configuration loading from relay.toml.

use runtime::{ConversationConfig, DEFAULT_MAX_ROUND_TRIPS, DEFAULT_MAX_TOKENS};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Looked up in the working directory when `--config` isn't given.
pub const CONFIG_FILE: &str = "relay.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Which model API to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::Gemini => "gemini-2.0-flash",
        }
    }

    /// Environment variable consulted when no key is configured.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => f.write_str("anthropic"),
            Self::Gemini => f.write_str("gemini"),
        }
    }
}

/// Model provider configuration.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Defaults per provider when unset.
    pub model: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Takes precedence over the provider's environment variable.
    pub api_key: Option<String>,

    pub system: Option<String>,

    /// Alternate API endpoint (proxies, gateways).
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            max_tokens: default_max_tokens(),
            api_key: None,
            system: None,
            base_url: None,
        }
    }
}

/// MCP session and query loop limits.
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_round_trips")]
    pub max_round_trips: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_round_trips: default_max_round_trips(),
        }
    }
}

impl SessionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_request_timeout_secs() -> u64 {
    mcp::DEFAULT_TIMEOUT.as_secs()
}

fn default_max_round_trips() -> usize {
    DEFAULT_MAX_ROUND_TRIPS
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load an explicit path, or `relay.toml` if present, or defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE).exists() => Self::load(CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.max_tokens == 0 {
            return Err(ConfigError::Invalid("model.max_tokens must be positive".into()));
        }
        if self.session.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "session.request_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn model_name(&self) -> &str {
        self.model
            .model
            .as_deref()
            .unwrap_or_else(|| self.model.provider.default_model())
    }

    /// The API key from config, falling back to the environment.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.api_key_from(|var| std::env::var(var).ok())
    }

    fn api_key_from(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
        let provider = self.model.provider;
        self.model
            .api_key
            .clone()
            .or_else(|| lookup(provider.api_key_var()))
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey {
                provider,
                var: provider.api_key_var(),
            })
    }

    pub fn conversation(&self) -> ConversationConfig {
        ConversationConfig {
            max_tokens: self.model.max_tokens,
            max_round_trips: self.session.max_round_trips,
            system: self.model.system.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("no API key for {provider}: set model.api_key or {var}")]
    MissingApiKey {
        provider: ProviderKind,
        var: &'static str,
    },
}
