//! # Environment-Based Configuration
//!
//! Settings for the bridge and for the bot the worker spawns, loaded from
//! environment variables with validated defaults.
//!
//! ## Environment Variables
//!
//! ### Bridge
//! - `GUILD_BRIDGE_TIMEOUT_SECS` - Upper bound on a synchronous call (default: 600)
//! - `GUILD_ACK_TIMEOUT_SECS` - How long to wait for a long-running action's
//!   acknowledgment (default: 10)
//! - `GUILD_OPERATION_IDS` - Operation id strategy, `uuid` or `sequential` (default: uuid)
//! - `GUILD_QUEUE_WARN_DEPTH` - Completion queue depth that triggers a warning (default: 64)
//!
//! ### Worker
//! - `MINECRAFT_HOST` - Server host (default: localhost)
//! - `MINECRAFT_PORT` - Server port (default: 25565)
//! - `MINECRAFT_BOT_USERNAME` - Bot username (default: GuildBot)
//! - `MINECRAFT_AUTH` - Auth mode (default: offline)
//! - `MINECRAFT_VERSION` - Game version, auto-detected when unset
//! - `MINECRAFT_TELEPORT` - Initial teleport coordinates as `x,y,z`

use guild_core::BotOptions;
use serde::Serialize;
use std::{env, fmt, str::FromStr, time::Duration};

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// How the gateway mints operation ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationIdStrategy {
    /// `op-<uuid>`; unique across processes.
    #[default]
    Uuid,
    /// `op-1`, `op-2`, ...; readable logs, unique within one client.
    Sequential,
}

impl FromStr for OperationIdStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uuid" => Ok(OperationIdStrategy::Uuid),
            "sequential" | "seq" => Ok(OperationIdStrategy::Sequential),
            other => Err(format!("unknown strategy '{other}', expected uuid/sequential")),
        }
    }
}

impl fmt::Display for OperationIdStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationIdStrategy::Uuid => write!(f, "uuid"),
            OperationIdStrategy::Sequential => write!(f, "sequential"),
        }
    }
}

/// Validated bridge configuration.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeConfig {
    /// Bound on a synchronous call. Must exceed the worker's own
    /// per-action timeouts so the worker's error wins when both fire.
    pub bridge_timeout: Duration,
    /// Bound on the acknowledgment of a long-running action.
    pub ack_timeout: Duration,
    pub operation_ids: OperationIdStrategy,
    pub queue_warn_depth: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bridge_timeout: Duration::from_secs(600),
            ack_timeout: Duration::from_secs(10),
            operation_ids: OperationIdStrategy::Uuid,
            queue_warn_depth: 64,
        }
    }
}

/// Builder for `BridgeConfig` with environment variable support
#[derive(Debug, Clone)]
pub struct BridgeConfigBuilder {
    bridge_timeout_secs: u64,
    ack_timeout_secs: u64,
    operation_ids: OperationIdStrategy,
    queue_warn_depth: usize,
}

impl Default for BridgeConfigBuilder {
    fn default() -> Self {
        let defaults = BridgeConfig::default();
        Self {
            bridge_timeout_secs: defaults.bridge_timeout.as_secs(),
            ack_timeout_secs: defaults.ack_timeout.as_secs(),
            operation_ids: defaults.operation_ids,
            queue_warn_depth: defaults.queue_warn_depth,
        }
    }
}

impl BridgeConfigBuilder {
    /// Create a new builder with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any environment variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::default();

        if let Some(secs) = get_env_u64("GUILD_BRIDGE_TIMEOUT_SECS")? {
            builder = builder.bridge_timeout_secs(secs);
        }
        if let Some(secs) = get_env_u64("GUILD_ACK_TIMEOUT_SECS")? {
            builder = builder.ack_timeout_secs(secs);
        }
        if let Some(strategy) = get_env_parsed::<OperationIdStrategy>("GUILD_OPERATION_IDS")? {
            builder = builder.operation_ids(strategy);
        }
        if let Some(depth) = get_env_parsed::<usize>("GUILD_QUEUE_WARN_DEPTH")? {
            builder = builder.queue_warn_depth(depth);
        }

        Ok(builder)
    }

    #[must_use]
    pub fn bridge_timeout_secs(mut self, secs: u64) -> Self {
        self.bridge_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn ack_timeout_secs(mut self, secs: u64) -> Self {
        self.ack_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn operation_ids(mut self, strategy: OperationIdStrategy) -> Self {
        self.operation_ids = strategy;
        self
    }

    #[must_use]
    pub fn queue_warn_depth(mut self, depth: usize) -> Self {
        self.queue_warn_depth = depth;
        self
    }

    /// Validate configuration and build `BridgeConfig`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the configuration is invalid.
    pub fn build(self) -> Result<BridgeConfig, ConfigError> {
        self.validate()?;

        Ok(BridgeConfig {
            bridge_timeout: Duration::from_secs(self.bridge_timeout_secs),
            ack_timeout: Duration::from_secs(self.ack_timeout_secs),
            operation_ids: self.operation_ids,
            queue_warn_depth: self.queue_warn_depth,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "bridge_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.ack_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "ack_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.ack_timeout_secs > self.bridge_timeout_secs {
            return Err(ConfigError::ValidationError(
                "ack_timeout_secs must be <= bridge_timeout_secs".to_string(),
            ));
        }
        if self.queue_warn_depth == 0 {
            return Err(ConfigError::ValidationError(
                "queue_warn_depth must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Connection settings for the bot spawned by `initialize_bot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: String,
    pub version: Option<String>,
    pub teleport: Option<[i32; 3]>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25565,
            username: "GuildBot".to_string(),
            auth: "offline".to_string(),
            version: None,
            teleport: None,
        }
    }
}

impl WorkerSettings {
    /// Load worker settings from `MINECRAFT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(host) = get_env_string("MINECRAFT_HOST") {
            settings.host = host;
        }
        if let Some(port) = get_env_parsed::<u16>("MINECRAFT_PORT")? {
            settings.port = port;
        }
        if let Some(username) = get_env_string("MINECRAFT_BOT_USERNAME") {
            settings.username = username;
        }
        if let Some(auth) = get_env_string("MINECRAFT_AUTH") {
            settings.auth = auth;
        }
        settings.version = get_env_string("MINECRAFT_VERSION").filter(|v| !v.is_empty());
        if let Some(raw) = get_env_string("MINECRAFT_TELEPORT") {
            settings.teleport =
                Some(parse_coords(&raw).map_err(|message| ConfigError::InvalidEnvVar {
                    key: "MINECRAFT_TELEPORT".to_string(),
                    message,
                })?);
        }

        Ok(settings)
    }

    /// Arguments for the `initialize_bot` action.
    pub fn bot_options(&self) -> BotOptions {
        BotOptions {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            auth: self.auth.clone(),
            version: self.version.clone(),
            initial_teleport_coords: self.teleport,
        }
    }
}

/// Parse `x,y,z` into block coordinates.
pub fn parse_coords(raw: &str) -> Result<[i32; 3], String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected 'x,y,z', got '{raw}'"));
    }
    let mut coords = [0i32; 3];
    for (slot, part) in coords.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|e| format!("invalid coordinate '{part}': {e}"))?;
    }
    Ok(coords)
}

// Environment variable helper functions

fn get_env_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn get_env_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    get_env_parsed(key)
}

fn get_env_parsed<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("invalid value '{val}': {e}"),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder() {
        let config = BridgeConfigBuilder::new().build().unwrap();
        assert_eq!(config.bridge_timeout, Duration::from_secs(600));
        assert_eq!(config.ack_timeout, Duration::from_secs(10));
        assert_eq!(config.operation_ids, OperationIdStrategy::Uuid);
        assert_eq!(config.queue_warn_depth, 64);
    }

    #[test]
    fn test_builder_validation_timeout() {
        let result = BridgeConfigBuilder::new().bridge_timeout_secs(0).build();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("bridge_timeout_secs must be greater than 0")
        );
    }

    #[test]
    fn test_ack_timeout_cannot_exceed_bridge_timeout() {
        let result = BridgeConfigBuilder::new()
            .bridge_timeout_secs(5)
            .ack_timeout_secs(10)
            .build();
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "Sequential".parse::<OperationIdStrategy>().unwrap(),
            OperationIdStrategy::Sequential
        );
        assert_eq!(
            "uuid".parse::<OperationIdStrategy>().unwrap(),
            OperationIdStrategy::Uuid
        );
        assert!("random".parse::<OperationIdStrategy>().is_err());
    }

    #[test]
    fn test_parse_coords() {
        assert_eq!(parse_coords("10, 64,-20").unwrap(), [10, 64, -20]);
        assert!(parse_coords("10,64").is_err());
        assert!(parse_coords("a,b,c").is_err());
    }

    #[test]
    fn test_bot_options_from_settings() {
        let settings = WorkerSettings {
            teleport: Some([1, 2, 3]),
            ..WorkerSettings::default()
        };
        let options = settings.bot_options();
        assert_eq!(options.port, 25565);
        assert_eq!(options.auth, "offline");
        assert_eq!(options.initial_teleport_coords, Some([1, 2, 3]));
    }
}
