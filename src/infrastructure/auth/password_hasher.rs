//! Password hashing service using Argon2id

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHasher as Argon2Hasher, SaltString, rand_core::OsRng},
};

use crate::domain::{Password, PasswordHash, ProfileError};

/// Argon2id password hasher
///
/// Hashing runs on the blocking thread pool so registration bursts do not
/// stall the async runtime.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// Memory cost: 19 MiB (19,456 KiB)
    const MEMORY_COST: u32 = 19_456;
    const TIME_COST: u32 = 2;
    const PARALLELISM: u32 = 1;
    /// Output hash length in bytes
    const OUTPUT_LEN: usize = 32;

    pub fn new() -> Result<Self, argon2::Error> {
        Self::with_params(Self::MEMORY_COST, Self::TIME_COST, Self::PARALLELISM)
    }

    /// Create a hasher with custom cost parameters
    pub fn with_params(
        memory_cost: u32,
        time_cost: u32,
        parallelism: u32,
    ) -> Result<Self, argon2::Error> {
        let params = Params::new(memory_cost, time_cost, parallelism, Some(Self::OUTPUT_LEN))?;
        Ok(Self { params })
    }

    /// Hash a validated password
    pub async fn hash(&self, password: Password) -> Result<PasswordHash, ProfileError> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
            argon2
                .hash_password(password.as_str().as_bytes(), &salt)
                .map(|h| h.to_string())
        })
        .await
        .map_err(|e| {
            tracing::error!("Password hash task panicked: {}", e);
            ProfileError::PasswordHashing
        })?
        .map(PasswordHash::from)
        .map_err(|e| {
            tracing::error!("Failed to hash password: {}", e);
            ProfileError::PasswordHashing
        })
    }
}
