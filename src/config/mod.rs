//! Configuration management

pub mod validation;

pub use validation::{MAX_WINDOW_SECONDS, Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Output format: "json" or "pretty"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/community".to_string(),
            max_connections: 10,
            connect_timeout_seconds: 10,
        }
    }
}

/// Shared counter store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Dragonfly DB connection URL (e.g., "redis://127.0.0.1:6379")
    pub dragonfly_url: String,
    /// Connection timeout in seconds for Dragonfly DB
    pub connection_timeout_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dragonfly_url: "redis://localhost:6379/0".to_string(),
            connection_timeout_seconds: 5,
        }
    }
}

/// Storage backend for rate limiting
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStorageBackend {
    /// Use Dragonfly/Redis for distributed rate limiting (recommended for production)
    #[default]
    Dragonfly,
    /// Use in-memory storage (suitable for development/single instance)
    Memory,
}

/// A single limit/window pair as it appears in configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitPolicyConfig {
    /// Maximum requests per window
    pub limit: u32,
    /// Window length in seconds
    pub window_seconds: u64,
    /// Optional tighter cap checked before `limit`
    #[serde(default)]
    pub burst_limit: Option<u32>,
}

impl RateLimitPolicyConfig {
    pub const fn hourly(limit: u32) -> Self {
        Self {
            limit,
            window_seconds: 3600,
            burst_limit: None,
        }
    }
}

/// Local fallback cache bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalFallbackConfig {
    /// Maximum number of counters held in process
    pub max_entries: usize,
    /// Interval between sweeps of expired counters
    pub cleanup_interval_seconds: u64,
}

impl Default for LocalFallbackConfig {
    fn default() -> Self {
        Self {
            max_entries: 100_000,
            cleanup_interval_seconds: 300, // 5 minutes
        }
    }
}

/// Content creation limits by account tier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContentLimitConfig {
    /// Short window checked before the hourly one
    pub burst_window_seconds: u64,
    /// Accounts younger than this are in the new tier
    pub new_account_days: u32,
    /// Accounts younger than this (and past the new tier) are regular
    pub regular_account_days: u32,
}

impl Default for ContentLimitConfig {
    fn default() -> Self {
        Self {
            burst_window_seconds: 300,
            new_account_days: 7,
            regular_account_days: 30,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// Storage backend for rate limit counters
    pub storage_backend: RateLimitStorageBackend,
    /// Prefix for counter keys in the shared store
    pub key_prefix: String,
    /// Upper bound for a single shared store round trip, in milliseconds
    pub store_timeout_ms: u64,
    /// Policy used when a named policy is not configured
    pub default_policy: RateLimitPolicyConfig,
    /// Named policies, keyed by endpoint kind
    pub policies: HashMap<String, RateLimitPolicyConfig>,
    pub local_fallback: LocalFallbackConfig,
    pub content: ContentLimitConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let policies = [
            ("user_profile", RateLimitPolicyConfig::hourly(200)),
            ("user_search", RateLimitPolicyConfig::hourly(100)),
            ("event_listing", RateLimitPolicyConfig::hourly(300)),
            ("event_search", RateLimitPolicyConfig::hourly(150)),
            ("service_listing", RateLimitPolicyConfig::hourly(300)),
            ("service_search", RateLimitPolicyConfig::hourly(150)),
            ("forum_listing", RateLimitPolicyConfig::hourly(400)),
            ("message_history", RateLimitPolicyConfig::hourly(500)),
            (
                "per_minute",
                RateLimitPolicyConfig {
                    limit: 60,
                    window_seconds: 60,
                    burst_limit: None,
                },
            ),
        ]
        .into_iter()
        .map(|(name, policy)| (name.to_string(), policy))
        .collect();

        Self {
            enabled: true,
            storage_backend: RateLimitStorageBackend::Dragonfly,
            key_prefix: "rate_limit".to_string(),
            store_timeout_ms: 250,
            default_policy: RateLimitPolicyConfig::hourly(1000),
            policies,
            local_fallback: LocalFallbackConfig::default(),
            content: ContentLimitConfig::default(),
        }
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        validation::Validate::validate(&self.logging)?;
        validation::Validate::validate(&self.database)?;
        validation::Validate::validate(&self.cache)?;
        validation::Validate::validate(&self.rate_limit)?;
        Ok(())
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        // Add environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        // Add local config and environment variables last (highest priority)
        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("COMMUNITY").separator("__"));

        let mut config: Config = builder.build()?.try_deserialize()?;

        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            config.database.url = database_url;
        }
        if let Ok(redis_url) = std::env::var("REDIS_URL") {
            config.cache.dragonfly_url = redis_url;
        }

        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}
