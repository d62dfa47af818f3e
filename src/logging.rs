//! Structured logging with tracing

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Error raised when the global subscriber cannot be installed
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("Failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level` when it is set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| LoggingError::InvalidFilter {
            filter: config.level.clone(),
            message: e.to_string(),
        })?,
    };

    let builder = fmt().with_env_filter(filter).with_target(true);

    let result = if config.format == "pretty" {
        builder.pretty().try_init()
    } else {
        builder.json().with_current_span(true).try_init()
    };

    result.map_err(|e| LoggingError::Install(e.to_string()))
}
