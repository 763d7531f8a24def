//! Client configuration
//!
//! Built in code with `ClientConfig::new(token)` and the `with_*` methods,
//! loaded from `GUILDLINK_*` environment variables, or deserialized from a
//! host application's config file. Durations are given in milliseconds.

use serde::{Deserialize, Deserializer};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub bot_token: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Gateway URL override; fetched from `/gateway/bot` when unset
    #[serde(default)]
    pub gateway_url: Option<String>,
    #[serde(
        rename = "http_timeout_ms",
        default = "default_http_timeout",
        deserialize_with = "duration_ms"
    )]
    pub http_timeout: Duration,
    /// Proxy URL for REST traffic
    #[serde(default)]
    pub proxy: Option<String>,
    /// Fail requests immediately instead of waiting out rate limits
    #[serde(default)]
    pub cancel_on_rate_limit: bool,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub shards: ShardConfig,
    #[serde(default)]
    pub activate_event_channels: bool,
    #[serde(default = "default_event_channel_size")]
    pub event_channel_size: usize,
    /// Capacity of the queue between the shards and the intake loop
    #[serde(default = "default_event_queue_size")]
    pub event_queue_size: usize,
    /// Appended to the User-Agent header
    #[serde(default)]
    pub project_name: String,
}

/// Cache sizing; a limit of 0 disables that entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_limit_users")]
    pub limit_users: usize,
    #[serde(default = "default_limit_voice_states")]
    pub limit_voice_states: usize,
    #[serde(default = "default_limit_channels")]
    pub limit_channels: usize,
    #[serde(default = "default_limit_guilds")]
    pub limit_guilds: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            limit_users: default_limit_users(),
            limit_voice_states: default_limit_voice_states(),
            limit_channels: default_limit_channels(),
            limit_guilds: default_limit_guilds(),
        }
    }
}

impl CacheConfig {
    /// Cache with every entity kind turned off
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            limit_users: 0,
            limit_voice_states: 0,
            limit_channels: 0,
            limit_guilds: 0,
        }
    }
}

/// Sharding and identify settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShardConfig {
    /// Total shard count; the recommended count is used when unset
    #[serde(default)]
    pub shard_count: Option<u32>,
    /// Maximum number of shards run by this process (ids `0..limit`)
    #[serde(default)]
    pub shard_limit: Option<u32>,
    /// Minimum spacing between identifies across all shards
    #[serde(
        rename = "identify_interval_ms",
        default = "default_identify_interval",
        deserialize_with = "duration_ms"
    )]
    pub identify_interval: Duration,
    #[serde(default = "default_gateway_version")]
    pub gateway_version: u8,
    /// Raw intent bits; the non-privileged set is used when unset
    #[serde(default)]
    pub intents: Option<u64>,
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u32,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            shard_count: None,
            shard_limit: None,
            identify_interval: default_identify_interval(),
            gateway_version: default_gateway_version(),
            intents: None,
            large_threshold: default_large_threshold(),
        }
    }
}

fn duration_ms<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

// Default value functions
fn default_cache_enabled() -> bool {
    true
}

fn default_api_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_limit_users() -> usize {
    1000
}

fn default_limit_voice_states() -> usize {
    1000
}

fn default_limit_channels() -> usize {
    1000
}

fn default_limit_guilds() -> usize {
    100
}

fn default_identify_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_gateway_version() -> u8 {
    10
}

fn default_large_threshold() -> u32 {
    250
}

fn default_event_channel_size() -> usize {
    20
}

fn default_event_queue_size() -> usize {
    128
}

impl ClientConfig {
    /// Configuration with defaults for everything but the token
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_url: default_api_url(),
            gateway_url: None,
            http_timeout: default_http_timeout(),
            proxy: None,
            cancel_on_rate_limit: false,
            cache: CacheConfig::default(),
            shards: ShardConfig::default(),
            activate_event_channels: false,
            event_channel_size: default_event_channel_size(),
            event_queue_size: default_event_queue_size(),
            project_name: String::new(),
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    #[must_use]
    pub fn with_cancel_on_rate_limit(mut self, cancel: bool) -> Self {
        self.cancel_on_rate_limit = cancel;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn without_cache(self) -> Self {
        self.with_cache(CacheConfig::disabled())
    }

    #[must_use]
    pub fn with_shard_count(mut self, count: u32) -> Self {
        self.shards.shard_count = Some(count);
        self
    }

    #[must_use]
    pub fn with_shard_limit(mut self, limit: u32) -> Self {
        self.shards.shard_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_identify_interval(mut self, interval: Duration) -> Self {
        self.shards.identify_interval = interval;
        self
    }

    #[must_use]
    pub fn with_intents(mut self, intents: u64) -> Self {
        self.shards.intents = Some(intents);
        self
    }

    /// Enable per-event output channels of the given capacity
    #[must_use]
    pub fn with_event_channels(mut self, size: usize) -> Self {
        self.activate_event_channels = true;
        self.event_channel_size = size;
        self
    }

    #[must_use]
    pub fn with_event_queue_size(mut self, size: usize) -> Self {
        self.event_queue_size = size;
        self
    }

    #[must_use]
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = name.into();
        self
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `GUILDLINK_BOT_TOKEN` is missing or a variable
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let token = env::var("GUILDLINK_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingVar("GUILDLINK_BOT_TOKEN"))?;
        let mut config = Self::new(token);

        if let Ok(url) = env::var("GUILDLINK_API_URL") {
            config = config.with_api_url(url);
        }
        config.gateway_url = env::var("GUILDLINK_GATEWAY_URL").ok();
        config.proxy = env::var("GUILDLINK_PROXY").ok();
        if let Some(cancel) = parse_var("GUILDLINK_CANCEL_ON_RATE_LIMIT")? {
            config.cancel_on_rate_limit = cancel;
        }

        if parse_var::<bool>("GUILDLINK_DISABLE_CACHE")?.unwrap_or(false) {
            config.cache = CacheConfig::disabled();
        } else {
            let cache = &mut config.cache;
            if let Some(limit) = parse_var("GUILDLINK_CACHE_LIMIT_USERS")? {
                cache.limit_users = limit;
            }
            if let Some(limit) = parse_var("GUILDLINK_CACHE_LIMIT_VOICE_STATES")? {
                cache.limit_voice_states = limit;
            }
            if let Some(limit) = parse_var("GUILDLINK_CACHE_LIMIT_CHANNELS")? {
                cache.limit_channels = limit;
            }
            if let Some(limit) = parse_var("GUILDLINK_CACHE_LIMIT_GUILDS")? {
                cache.limit_guilds = limit;
            }
        }

        config.shards.shard_count = parse_var("GUILDLINK_SHARD_COUNT")?;
        config.shards.shard_limit = parse_var("GUILDLINK_SHARD_LIMIT")?;
        if let Some(ms) = parse_var::<u64>("GUILDLINK_IDENTIFY_INTERVAL_MS")? {
            config.shards.identify_interval = Duration::from_millis(ms);
        }
        config.shards.intents = parse_var("GUILDLINK_INTENTS")?;

        if let Some(active) = parse_var("GUILDLINK_ACTIVATE_EVENT_CHANNELS")? {
            config.activate_event_channels = active;
        }
        if let Some(size) = parse_var("GUILDLINK_EVENT_CHANNEL_SIZE")? {
            config.event_channel_size = size;
        }
        if let Ok(name) = env::var("GUILDLINK_PROJECT_NAME") {
            config.project_name = name;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that can never work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::InvalidValue("bot_token", "empty".to_string()));
        }
        if self.shards.shard_count == Some(0) {
            return Err(ConfigError::InvalidValue("shard_count", "0".to_string()));
        }
        if self.shards.shard_limit == Some(0) {
            return Err(ConfigError::InvalidValue("shard_limit", "0".to_string()));
        }
        if self.activate_event_channels && self.event_channel_size == 0 {
            return Err(ConfigError::InvalidValue("event_channel_size", "0".to_string()));
        }
        if self.event_queue_size == 0 {
            return Err(ConfigError::InvalidValue("event_queue_size", "0".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ClientConfig::new("token");
        assert_eq!(config.api_url, "https://discord.com/api/v10");
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.event_channel_size, 20);
        assert_eq!(config.cache.limit_users, 1000);
        assert_eq!(config.cache.limit_guilds, 100);
        assert_eq!(config.shards.identify_interval, Duration::from_secs(5));
        assert!(config.shards.shard_count.is_none());
        assert!(!config.activate_event_channels);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("token")
            .with_api_url("http://127.0.0.1:9000/api/")
            .with_shard_count(4)
            .with_event_channels(5)
            .without_cache();

        assert_eq!(config.api_url, "http://127.0.0.1:9000/api");
        assert_eq!(config.shards.shard_count, Some(4));
        assert!(config.activate_event_channels);
        assert_eq!(config.event_channel_size, 5);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.limit_channels, 0);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "bot_token": "token",
                "http_timeout_ms": 2500,
                "cache": {"limit_guilds": 5},
                "shards": {"shard_count": 2, "identify_interval_ms": 100}
            }"#,
        )
        .unwrap();

        assert_eq!(config.api_url, "https://discord.com/api/v10");
        assert_eq!(config.http_timeout, Duration::from_millis(2500));
        assert!(config.cache.enabled);
        assert_eq!(config.cache.limit_guilds, 5);
        assert_eq!(config.cache.limit_users, 1000);
        assert_eq!(config.shards.shard_count, Some(2));
        assert_eq!(config.shards.identify_interval, Duration::from_millis(100));
        assert_eq!(config.shards.large_threshold, 250);
        assert_eq!(config.event_queue_size, 128);
        assert!(config.validate().is_ok());

        assert!(serde_json::from_str::<ClientConfig>("{}").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::new("token").validate().is_ok());
        assert!(ClientConfig::new("  ").validate().is_err());
        assert!(ClientConfig::new("token").with_shard_count(0).validate().is_err());
        assert!(ClientConfig::new("token").with_event_channels(0).validate().is_err());
    }
}
