//! Account use cases: registration, self-service profile edits, and
//! administrative activation.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::{
    DisplayName, Email, IUserRepository, NotificationPreferences, Password, PrivacyToggle,
    ProfileDetails, ProfileError, User, UserId, ViewerContext,
};
use crate::infrastructure::auth::PasswordHasher;

/// Registration input as received from the caller
#[derive(Debug, Clone)]
pub struct RegisterUser {
    pub display_name: String,
    pub email: String,
    pub password: String,
    pub profile: ProfileDetails,
}

/// Partial profile change; `None` leaves a part untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub profile: Option<ProfileDetails>,
    /// Toggle -> hidden
    pub privacy: BTreeMap<PrivacyToggle, bool>,
    pub notifications: Option<NotificationPreferences>,
}

pub struct UserAccountService {
    user_repository: Arc<dyn IUserRepository>,
    password_hasher: PasswordHasher,
}

impl UserAccountService {
    pub fn new(user_repository: Arc<dyn IUserRepository>, password_hasher: PasswordHasher) -> Self {
        Self {
            user_repository,
            password_hasher,
        }
    }

    /// Register a new active, non-admin account
    #[instrument(skip(self, request), fields(display_name = %request.display_name))]
    pub async fn register(&self, request: RegisterUser) -> Result<User, ProfileError> {
        let display_name = DisplayName::new(request.display_name)
            .map_err(|reason| ProfileError::InvalidDisplayName { reason })?;
        let email =
            Email::new(request.email).map_err(|reason| ProfileError::InvalidEmail { reason })?;
        let password = Password::new(request.password).map_err(|e| ProfileError::WeakPassword {
            requirements: e.missing_requirements.join(", "),
        })?;

        if self
            .user_repository
            .find_by_display_name(&display_name)
            .await?
            .is_some()
        {
            return Err(ProfileError::DisplayNameTaken);
        }

        if self.user_repository.find_by_email(&email).await?.is_some() {
            return Err(ProfileError::EmailTaken);
        }

        let password_hash = self.password_hasher.hash(password).await?;
        let new_user = User::register(display_name, email, password_hash, request.profile);
        let user = self.user_repository.create(new_user).await?;

        info!(user_id = %user.user_id, "User registered");
        Ok(user)
    }

    /// Apply a profile change made by the account owner
    #[instrument(skip(self, actor, update), fields(subject_id = %subject_id))]
    pub async fn update_profile(
        &self,
        actor: &ViewerContext,
        subject_id: UserId,
        update: ProfileUpdate,
    ) -> Result<User, ProfileError> {
        if actor.user_id() != Some(subject_id) {
            return Err(ProfileError::InsufficientPermissions);
        }

        let mut user = self
            .user_repository
            .find_by_id(subject_id)
            .await?
            .ok_or(ProfileError::NotFound)?;

        if let Some(raw_name) = update.display_name {
            let display_name = DisplayName::new(raw_name)
                .map_err(|reason| ProfileError::InvalidDisplayName { reason })?;

            if display_name != user.display_name {
                let taken = self
                    .user_repository
                    .find_by_display_name(&display_name)
                    .await?
                    .is_some_and(|other| other.user_id != subject_id);
                if taken {
                    return Err(ProfileError::DisplayNameTaken);
                }
                user.rename(display_name);
            }
        }

        if let Some(profile) = update.profile {
            user.update_profile(profile);
        }

        for (toggle, hidden) in update.privacy {
            user.set_privacy(toggle, hidden);
        }

        if let Some(notifications) = update.notifications {
            user.set_notifications(notifications);
        }

        self.user_repository.update(&user).await?;
        Ok(user)
    }

    /// Soft-disable or re-enable an account (administrators only)
    #[instrument(skip(self, actor), fields(subject_id = %subject_id))]
    pub async fn set_active(
        &self,
        actor: &ViewerContext,
        subject_id: UserId,
        active: bool,
    ) -> Result<User, ProfileError> {
        if !actor.is_admin() {
            return Err(ProfileError::InsufficientPermissions);
        }

        let mut user = self
            .user_repository
            .find_by_id(subject_id)
            .await?
            .ok_or(ProfileError::NotFound)?;

        if active {
            user.reactivate();
        } else {
            user.deactivate();
        }

        self.user_repository.update(&user).await?;
        info!(user_id = %subject_id, active, "Account activation changed");
        Ok(user)
    }
}
