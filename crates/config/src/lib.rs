//! Configuration loading, validation, and management for Chorus.
//!
//! Loads configuration from `~/.chorus/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Backend ids in registration priority order.
pub const PROVIDER_IDS: [&str; 3] = ["openai", "gemini", "anthropic"];

/// The root configuration structure.
///
/// Maps directly to `~/.chorus/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name the bot answers to
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Provider used by channels that have not been pinned
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// IANA time zone used when telling the model the current time
    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    /// Conversation handling
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Provider-specific configurations, keyed by provider id
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Discord REST settings
    #[serde(default)]
    pub discord: DiscordConfig,
}

fn default_bot_name() -> String {
    "Chorus".into()
}
fn default_provider() -> String {
    "openai".into()
}
fn default_time_zone() -> String {
    "America/New_York".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bot_name", &self.bot_name)
            .field("default_provider", &self.default_provider)
            .field("time_zone", &self.time_zone)
            .field("conversation", &self.conversation)
            .field("providers", &self.providers)
            .field("discord", &self.discord)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Idle time after which a channel's conversation is forgotten
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Channel messages seeded into a fresh conversation
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Queue overlapping turns on the same channel
    #[serde(default = "default_true")]
    pub serialize_turns: bool,

    /// Seconds between "working" indicators
    #[serde(default = "default_typing_interval")]
    pub typing_interval_secs: u64,
}

fn default_idle_timeout() -> u64 {
    300
}
fn default_history_limit() -> usize {
    10
}
fn default_typing_interval() -> u64 {
    8
}
fn default_true() -> bool {
    true
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            history_limit: default_history_limit(),
            serialize_turns: true,
            typing_interval_secs: default_typing_interval(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_model: Option<String>,

    /// Overrides the adapter's built-in personality text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,

    /// Extended thinking budget (Anthropic only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("image_model", &self.image_model)
            .field("personality", &self.personality)
            .field("thinking_budget", &self.thinking_budget)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.chorus/config.toml).
    ///
    /// Environment variables override the file:
    /// - `OPENAI_API_KEY`, `GEMINI_API_KEY` (or `GOOGLE_API_KEY`), `ANTHROPIC_API_KEY`
    /// - `DISCORD_TOKEN`
    /// - `CHORUS_DEFAULT_PROVIDER`, `CHORUS_BOT_NAME`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // The first non-blank variable per provider wins
        let keys: [(&str, &[&str]); 3] = [
            ("openai", &["OPENAI_API_KEY"]),
            ("gemini", &["GEMINI_API_KEY", "GOOGLE_API_KEY"]),
            ("anthropic", &["ANTHROPIC_API_KEY"]),
        ];
        for (provider, vars) in keys {
            let from_env = vars
                .iter()
                .copied()
                .find_map(|var| lookup(var).filter(|v| !v.trim().is_empty()));
            if let Some(key) = from_env {
                self.providers.entry(provider.to_string()).or_default().api_key = Some(key);
            }
        }

        if let Some(token) = lookup("DISCORD_TOKEN").filter(|v| !v.trim().is_empty()) {
            self.discord.bot_token = Some(token);
        }
        if let Some(provider) = lookup("CHORUS_DEFAULT_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(name) = lookup("CHORUS_BOT_NAME") {
            self.bot_name = name;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".chorus")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.conversation.idle_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "conversation.idle_timeout_secs must be > 0".into(),
            ));
        }

        if self.conversation.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "conversation.history_limit must be > 0".into(),
            ));
        }

        if self.time_zone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "time_zone \"{}\" is not a valid IANA time zone",
                self.time_zone
            )));
        }

        Ok(())
    }

    /// The configured time zone (falls back to UTC if unparseable).
    pub fn tz(&self) -> chrono_tz::Tz {
        self.time_zone.parse().unwrap_or(chrono_tz::UTC)
    }

    /// Settings for one provider (empty if unconfigured).
    pub fn provider(&self, id: &str) -> ProviderConfig {
        self.providers.get(id).cloned().unwrap_or_default()
    }

    /// The credential for `id`, if present and non-empty.
    pub fn api_key(&self, id: &str) -> Option<&str> {
        self.providers
            .get(id)
            .and_then(|p| p.api_key.as_deref())
            .filter(|k| !k.trim().is_empty())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            default_provider: default_provider(),
            time_zone: default_time_zone(),
            conversation: ConversationConfig::default(),
            providers: HashMap::new(),
            discord: DiscordConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
