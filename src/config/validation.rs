//! Configuration validation module

use crate::config::{
    CacheConfig, ContentLimitConfig, DatabaseConfig, LoggingConfig, RateLimitConfig,
    RateLimitPolicyConfig,
};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Logging configuration error: {message}")]
    Logging { message: String },

    #[error("Cache configuration error: {message}")]
    Cache { message: String },

    #[error("Database configuration error: {message}")]
    Database { message: String },

    #[error("Rate limit configuration error: {message}")]
    RateLimit { message: String },
}

impl ValidationError {
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
        }
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.format.as_str() {
            "json" | "pretty" => {}
            other => {
                return Err(ValidationError::logging(format!(
                    "Unknown log format '{}', expected 'json' or 'pretty'",
                    other
                )));
            }
        }

        if self.level.trim().is_empty() {
            return Err(ValidationError::logging("Log level cannot be empty"));
        }

        Ok(())
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::database("Database URL cannot be empty"));
        }

        if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
            return Err(ValidationError::database(
                "Database URL must start with postgres:// or postgresql://",
            ));
        }

        if self.max_connections == 0 {
            return Err(ValidationError::database(
                "Max connections must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.dragonfly_url.starts_with("redis://") && !self.dragonfly_url.starts_with("rediss://")
        {
            return Err(ValidationError::cache(
                "Dragonfly URL must start with redis:// or rediss://",
            ));
        }

        if self.connection_timeout_seconds == 0 {
            return Err(ValidationError::cache(
                "Connection timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Longest accepted rate limit window (30 days)
pub const MAX_WINDOW_SECONDS: u64 = 30 * 24 * 60 * 60;

impl Validate for RateLimitPolicyConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.limit == 0 {
            return Err(ValidationError::rate_limit("limit must be greater than 0"));
        }

        if self.window_seconds == 0 {
            return Err(ValidationError::rate_limit(
                "window_seconds must be greater than 0",
            ));
        }

        if self.window_seconds > MAX_WINDOW_SECONDS {
            return Err(ValidationError::rate_limit(format!(
                "window_seconds must be at most {}",
                MAX_WINDOW_SECONDS
            )));
        }

        if self.burst_limit == Some(0) {
            return Err(ValidationError::rate_limit(
                "burst_limit must be greater than 0 when set",
            ));
        }

        Ok(())
    }
}

/// Shortest fixed content window; the burst window must stay below it
const CONTENT_HOURLY_WINDOW_SECONDS: u64 = 3600;

impl Validate for ContentLimitConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.burst_window_seconds == 0
            || self.burst_window_seconds >= CONTENT_HOURLY_WINDOW_SECONDS
        {
            return Err(ValidationError::rate_limit(format!(
                "content.burst_window_seconds must be between 1 and {}",
                CONTENT_HOURLY_WINDOW_SECONDS - 1
            )));
        }

        if self.regular_account_days < self.new_account_days {
            return Err(ValidationError::rate_limit(
                "content.regular_account_days must not be less than content.new_account_days",
            ));
        }

        Ok(())
    }
}

impl Validate for RateLimitConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.key_prefix.is_empty() {
            return Err(ValidationError::rate_limit("key_prefix cannot be empty"));
        }

        if self.store_timeout_ms == 0 {
            return Err(ValidationError::rate_limit(
                "store_timeout_ms must be greater than 0",
            ));
        }

        if self.local_fallback.max_entries == 0 {
            return Err(ValidationError::rate_limit(
                "local_fallback.max_entries must be greater than 0",
            ));
        }

        if self.local_fallback.cleanup_interval_seconds == 0 {
            return Err(ValidationError::rate_limit(
                "local_fallback.cleanup_interval_seconds must be greater than 0",
            ));
        }

        self.content.validate()?;
        self.default_policy.validate()?;
        for (name, policy) in &self.policies {
            policy.validate().map_err(|e| {
                ValidationError::rate_limit(format!("policy '{}': {}", name, e))
            })?;
        }

        Ok(())
    }
}
