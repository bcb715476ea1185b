//! Main application configuration
//!
//! This module defines the configuration structures for the race bot,
//! including TOML file loading, environment variable overrides and validation.

use crate::bot::{Command, ReplySettings, DEFAULT_PREFIX};
use crate::bot::handlers::{INFO_DELIMITER, MULTI_STREAM_URL, SEED_HASH_MARKER};
use crate::racetime::auth::ClientCredentials;
use crate::racetime::{websocket_base, RelayConfig, RelayPolicy};
use crate::races::MonitorConfig;
use crate::twitch::{IrcConfig, TWITCH_IRC_URL};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub racetime: RacetimeSettings,
    pub twitch: TwitchSettings,
    pub bot: BotSettings,
    pub relay: RelaySettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Serve `/health` and `/metrics`
    pub enable_health_server: bool,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Race-tracking service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RacetimeSettings {
    /// Service base URL
    pub url: String,
    /// Category slug to monitor
    pub category: String,
    /// Bot application credentials, needed only for the relay
    pub client_id: String,
    pub client_secret: String,
    /// Seconds between race list fetches
    pub refresh_interval_seconds: u64,
    /// Fetch immediately at startup instead of after one interval
    pub fetch_on_start: bool,
    /// Snapshots buffered per listener
    pub listener_capacity: usize,
}

/// Chat platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitchSettings {
    pub username: String,
    pub irc_oauth: String,
    pub irc_url: String,
    pub max_retry_attempts: u32,
    pub retry_delay_ms: u64,
}

/// Command bot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    /// Command prefix keyword
    pub prefix: String,
    /// TOML file with `[[broadcasters]]` records
    pub broadcasters_file: Option<String>,
    pub multi_stream_url: String,
    pub seed_hash_marker: String,
    pub info_delimiter: String,
}

/// Race room relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Room slug; the relay only runs when set
    pub room: Option<String>,
    pub policy: RelayPolicy,
    pub close_grace_ms: u64,
    pub max_retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub outgoing_capacity: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "racetime-bot".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            enable_health_server: true,
            shutdown_timeout_seconds: 10,
        }
    }
}

impl Default for RacetimeSettings {
    fn default() -> Self {
        Self {
            url: "https://racetime.gg".to_string(),
            category: "twwr".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            refresh_interval_seconds: 30,
            fetch_on_start: true,
            listener_capacity: 8,
        }
    }
}

impl Default for TwitchSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            irc_oauth: String::new(),
            irc_url: TWITCH_IRC_URL.to_string(),
            max_retry_attempts: 5,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            broadcasters_file: None,
            multi_stream_url: MULTI_STREAM_URL.to_string(),
            seed_hash_marker: SEED_HASH_MARKER.to_string(),
            info_delimiter: INFO_DELIMITER.to_string(),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            room: None,
            policy: RelayPolicy::Drop,
            close_grace_ms: 1000,
            max_retry_attempts: 5,
            retry_delay_ms: 1000,
            outgoing_capacity: 64,
        }
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", key, value))
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from a TOML file. Environment variables still
    /// override file values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&content)?;
        config.with_overrides(|key| env::var(key).ok())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| anyhow!("Invalid configuration file: {}", e))?;
        Ok(config)
    }

    /// Defaults overridden by whatever `lookup` returns, then validated
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_overrides(lookup)
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Service settings
        if let Some(name) = lookup("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Some(port) = lookup("HEALTH_PORT") {
            self.service.health_port = parse_var("HEALTH_PORT", &port)?;
        }
        if let Some(timeout) = lookup("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = parse_var("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }

        // Race-tracking settings
        if let Some(url) = lookup("RACETIME_URL") {
            self.racetime.url = url;
        }
        if let Some(category) = lookup("RACETIME_CATEGORY") {
            self.racetime.category = category;
        }
        if let Some(client_id) = lookup("RACETIME_CLIENT_ID") {
            self.racetime.client_id = client_id;
        }
        if let Some(client_secret) = lookup("RACETIME_CLIENT_SECRET") {
            self.racetime.client_secret = client_secret;
        }
        if let Some(interval) = lookup("RACE_REFRESH_INTERVAL_SECONDS") {
            self.racetime.refresh_interval_seconds =
                parse_var("RACE_REFRESH_INTERVAL_SECONDS", &interval)?;
        }

        // Chat settings
        if let Some(username) = lookup("TWITCH_USERNAME") {
            self.twitch.username = username;
        }
        if let Some(oauth) = lookup("TWITCH_IRC_OAUTH") {
            self.twitch.irc_oauth = oauth;
        }

        // Bot settings
        if let Some(prefix) = lookup("BOT_PREFIX") {
            self.bot.prefix = prefix;
        }
        if let Some(file) = lookup("BROADCASTERS_FILE") {
            self.bot.broadcasters_file = Some(file);
        }

        // Relay settings
        if let Some(room) = lookup("RELAY_ROOM") {
            self.relay.room = Some(room);
        }
        if let Some(policy) = lookup("RELAY_POLICY") {
            self.relay.policy = parse_var("RELAY_POLICY", &policy)?;
        }

        validate_config(&self)?;
        Ok(self)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get race list refresh interval as Duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.racetime.refresh_interval_seconds)
    }

    /// Realtime origin derived from the service URL
    pub fn ws_base_url(&self) -> String {
        websocket_base(&self.racetime.url)
    }

    pub fn credentials(&self) -> ClientCredentials {
        ClientCredentials {
            client_id: self.racetime.client_id.clone(),
            client_secret: self.racetime.client_secret.clone(),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: self.refresh_interval(),
            fetch_on_start: self.racetime.fetch_on_start,
            listener_capacity: self.racetime.listener_capacity,
        }
    }

    pub fn reply_settings(&self) -> ReplySettings {
        ReplySettings {
            prefix: self.bot.prefix.clone(),
            racetime_url: self.racetime.url.trim_end_matches('/').to_string(),
            multi_stream_url: self.bot.multi_stream_url.clone(),
            seed_hash_marker: self.bot.seed_hash_marker.clone(),
            info_delimiter: self.bot.info_delimiter.clone(),
        }
    }

    pub fn irc_config(&self, channels: Vec<String>) -> IrcConfig {
        IrcConfig {
            url: self.twitch.irc_url.clone(),
            username: self.twitch.username.clone(),
            oauth_token: self.twitch.irc_oauth.clone(),
            channels,
            max_retries: self.twitch.max_retry_attempts,
            retry_delay: Duration::from_millis(self.twitch.retry_delay_ms),
            ..Default::default()
        }
    }

    /// Relay settings for the configured room, if any
    pub fn relay_config(&self) -> Option<RelayConfig> {
        let room = self.relay.room.as_ref().filter(|r| !r.is_empty())?;
        Some(RelayConfig {
            ws_base_url: self.ws_base_url(),
            room: room.clone(),
            policy: self.relay.policy,
            prefix: self.bot.prefix.clone(),
            close_grace: Duration::from_millis(self.relay.close_grace_ms),
            max_retries: self.relay.max_retry_attempts,
            retry_delay: Duration::from_millis(self.relay.retry_delay_ms),
            outgoing_capacity: self.relay.outgoing_capacity,
        })
    }

    /// Whether chat credentials are present
    pub fn has_chat_credentials(&self) -> bool {
        !self.twitch.username.is_empty() && !self.twitch.irc_oauth.is_empty()
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.enable_health_server && config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate race-tracking settings
    let url = &config.racetime.url;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(anyhow!("Race service URL must be http(s): {}", url));
    }
    if config.racetime.category.trim().is_empty() {
        return Err(anyhow!("Race category cannot be empty"));
    }
    if config.racetime.refresh_interval_seconds == 0 {
        return Err(anyhow!("Race refresh interval must be greater than 0"));
    }
    if config.racetime.listener_capacity == 0 {
        return Err(anyhow!("Listener capacity must be greater than 0"));
    }

    // Validate bot settings
    Command::keyword_table(&config.bot.prefix)
        .map_err(|e| anyhow!("Invalid command prefix {:?}: {}", config.bot.prefix, e))?;
    if config.bot.seed_hash_marker.is_empty() || config.bot.info_delimiter.is_empty() {
        return Err(anyhow!("Seed hash marker and info delimiter cannot be empty"));
    }

    // Validate relay settings
    if config.relay.outgoing_capacity == 0 {
        return Err(anyhow!("Relay outgoing capacity must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.ws_base_url(), "wss://racetime.gg");
        assert!(config.relay_config().is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_vars(vars(&[
            ("RACETIME_URL", "http://localhost:8000"),
            ("RACETIME_CATEGORY", "ootr"),
            ("BOT_PREFIX", "!ootr"),
            ("RACE_REFRESH_INTERVAL_SECONDS", "15"),
            ("RELAY_ROOM", "clever-link-1234"),
            ("RELAY_POLICY", "echo"),
        ]))
        .unwrap();

        assert_eq!(config.racetime.category, "ootr");
        assert_eq!(config.reply_settings().prefix, "!ootr");
        assert_eq!(config.monitor_config().interval, Duration::from_secs(15));

        let relay = config.relay_config().unwrap();
        assert_eq!(relay.ws_base_url, "ws://localhost:8000");
        assert_eq!(relay.policy, RelayPolicy::Echo);
        assert_eq!(relay.prefix, "!ootr");
    }

    #[test]
    fn test_invalid_env_values() {
        assert!(AppConfig::from_vars(vars(&[("HEALTH_PORT", "eighty")])).is_err());
        assert!(AppConfig::from_vars(vars(&[("RACE_REFRESH_INTERVAL_SECONDS", "0")])).is_err());
        assert!(AppConfig::from_vars(vars(&[("RACETIME_CATEGORY", " ")])).is_err());
        assert!(AppConfig::from_vars(vars(&[("LOG_LEVEL", "loud")])).is_err());
        assert!(AppConfig::from_vars(vars(&[("BOT_PREFIX", "+bot")])).is_err());
        assert!(AppConfig::from_vars(vars(&[("RELAY_POLICY", "shout")])).is_err());
    }

    #[test]
    fn test_partial_toml_file() {
        let config = AppConfig::from_toml_str(
            r#"
            [racetime]
            category = "smr"

            [bot]
            broadcasters_file = "broadcasters.toml"

            [relay]
            room = "quick-fox-1"
            policy = "forward"
            "#,
        )
        .unwrap();

        assert_eq!(config.racetime.category, "smr");
        assert_eq!(config.racetime.refresh_interval_seconds, 30);
        assert_eq!(config.bot.prefix, "!twwr");
        assert_eq!(config.relay.policy, RelayPolicy::Forward);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_chat_credentials() {
        let mut config = AppConfig::default();
        assert!(!config.has_chat_credentials());
        config.twitch.username = "racebot".to_string();
        config.twitch.irc_oauth = "oauth:abc".to_string();
        assert!(config.has_chat_credentials());
        assert_eq!(config.irc_config(vec!["streamer".to_string()]).channels, vec!["streamer"]);
    }
}
