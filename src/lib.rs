//! Community Core - viewer-scoped user profiles and adaptive rate limiting
//!
//! # Modules
//!
//! - [`config`] - Strongly-typed configuration with file and environment variable support
//! - [`domain`] - User aggregate, value objects, and the field visibility policy
//! - [`application`] - Profile projection, account use cases and content limits
//! - [`infrastructure`] - Counter stores, rate limiter, Postgres repository, password hashing
//! - [`logging`] - Structured logging with tracing
//!
//! # Architecture
//!
//! ```text
//! community-core/
//! ├── domain/           # Pure business logic
//! │   └── user/         # Entities, value objects, visibility, repository trait
//! ├── application/      # Use cases and services
//! ├── infrastructure/   # External integrations
//! │   ├── rate_limiter/ # Dragonfly counters with local fallback
//! │   ├── repositories/ # PostgreSQL and in-memory user storage
//! │   └── auth/         # Argon2id password hashing
//! └── config/           # Configuration management
//! ```
//!
//! # Configuration
//!
//! ```rust,ignore
//! use community_core::Config;
//!
//! let config = Config::load()?;
//! ```
//!
//! Environment variables use the `COMMUNITY__` prefix with double underscore separators:
//!
//! ```bash
//! COMMUNITY__RATE_LIMIT__STORE_TIMEOUT_MS=100
//! COMMUNITY__RATE_LIMIT__POLICIES__USER_PROFILE__LIMIT=500
//! ```
//!
//! # Logging
//!
//! ```rust,ignore
//! use community_core::init_tracing;
//!
//! init_tracing(&config.logging)?;
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use config::Config;
pub use logging::init_tracing;
