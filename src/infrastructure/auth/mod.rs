//! Credential handling

pub mod password_hasher;

pub use password_hasher::PasswordHasher;
