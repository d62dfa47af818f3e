//! User repository traits

use async_trait::async_trait;

use super::entities::{NewUser, User};
use super::errors::ProfileError;
use super::value_objects::{DisplayName, Email, UserId};

/// User repository trait for user persistence
#[async_trait]
pub trait IUserRepository: Send + Sync {
    /// Find a user by id
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, ProfileError>;

    /// Find a user by email address
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, ProfileError>;

    /// Find a user by display name
    async fn find_by_display_name(
        &self,
        display_name: &DisplayName,
    ) -> Result<Option<User>, ProfileError>;

    /// Page through users in insertion order
    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<User>, ProfileError>;

    /// Insert a new user and return it with its assigned id
    async fn create(&self, user: NewUser) -> Result<User, ProfileError>;

    /// Persist changes to an existing user
    async fn update(&self, user: &User) -> Result<(), ProfileError>;
}
