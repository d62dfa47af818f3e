//! Infrastructure Layer - External concerns and implementations
//!
//! Counter stores, the Postgres user repository and password hashing.

pub mod auth;
pub mod database;
pub mod rate_limiter;
pub mod repositories;

pub use auth::PasswordHasher;
pub use database::connect_pool;
pub use rate_limiter::{RateLimiterService, RequestIdentityResolver, RequestMetadata};
pub use repositories::{InMemoryUserRepository, SqlxUserRepository};
