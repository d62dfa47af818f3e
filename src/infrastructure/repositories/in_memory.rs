//! In-memory user repository for development and tests

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::{DisplayName, Email, IUserRepository, NewUser, ProfileError, User, UserId};

/// Users kept in insertion order with sequential ids
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with already materialized users (ids are kept as given)
    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn check_unique(
    users: &[User],
    exclude: Option<UserId>,
    display_name: &DisplayName,
    email: &Email,
) -> Result<(), ProfileError> {
    let others = users
        .iter()
        .filter(|user| Some(user.user_id) != exclude);

    for user in others {
        if user.display_name == *display_name {
            return Err(ProfileError::DisplayNameTaken);
        }
        if user.email == *email {
            return Err(ProfileError::EmailTaken);
        }
    }

    Ok(())
}

#[async_trait]
impl IUserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, ProfileError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|user| user.user_id == user_id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, ProfileError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|user| user.email == *email).cloned())
    }

    async fn find_by_display_name(
        &self,
        display_name: &DisplayName,
    ) -> Result<Option<User>, ProfileError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|user| user.display_name == *display_name)
            .cloned())
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<User>, ProfileError> {
        let users = self.users.read().await;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(users.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn create(&self, user: NewUser) -> Result<User, ProfileError> {
        let mut users = self.users.write().await;
        check_unique(&users, None, &user.display_name, &user.email)?;

        let next_id = users
            .iter()
            .map(|user| user.user_id.as_i64())
            .max()
            .unwrap_or(0)
            + 1;
        let created = user.into_user(UserId(next_id), Utc::now());
        users.push(created.clone());
        Ok(created)
    }

    async fn update(&self, user: &User) -> Result<(), ProfileError> {
        let mut users = self.users.write().await;
        check_unique(&users, Some(user.user_id), &user.display_name, &user.email)?;

        let slot = users
            .iter_mut()
            .find(|existing| existing.user_id == user.user_id)
            .ok_or(ProfileError::NotFound)?;
        *slot = user.clone();
        Ok(())
    }
}
