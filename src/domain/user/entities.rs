//! User domain entities

use chrono::{DateTime, Utc};

use super::value_objects::*;

/// Free-text profile fields a user fills in about themself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDetails {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub profile_image_url: Option<String>,
}

/// User aggregate root
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    /// Globally unique public name
    pub display_name: DisplayName,
    /// Globally unique email address
    pub email: Email,
    /// Hashed password (never expose raw hash)
    pub password_hash: PasswordHash,
    pub profile: ProfileDetails,
    /// Accounts are soft-disabled through this flag, never deleted
    pub is_active: bool,
    pub is_admin: bool,
    pub email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub privacy: PrivacySettings,
    pub notifications: NotificationPreferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a freshly registered, active, non-admin user.
    ///
    /// The id is assigned by the repository on insert.
    pub fn register(
        display_name: DisplayName,
        email: Email,
        password_hash: PasswordHash,
        profile: ProfileDetails,
    ) -> NewUser {
        NewUser {
            display_name,
            email,
            password_hash,
            profile,
            is_admin: false,
            privacy: PrivacySettings::registration_default(),
            notifications: NotificationPreferences::default(),
        }
    }

    pub fn rename(&mut self, display_name: DisplayName) {
        self.display_name = display_name;
        self.touch();
    }

    pub fn update_profile(&mut self, profile: ProfileDetails) {
        self.profile = profile;
        self.touch();
    }

    pub fn set_privacy(&mut self, toggle: PrivacyToggle, hidden: bool) {
        self.privacy.set(toggle, hidden);
        self.touch();
    }

    pub fn set_notifications(&mut self, notifications: NotificationPreferences) {
        self.notifications = notifications;
        self.touch();
    }

    pub fn deactivate(&mut self) {
        if self.is_active {
            self.is_active = false;
            self.touch();
        }
    }

    pub fn reactivate(&mut self) {
        if !self.is_active {
            self.is_active = true;
            self.touch();
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A user that has passed validation but has no id yet
#[derive(Debug, Clone)]
pub struct NewUser {
    pub display_name: DisplayName,
    pub email: Email,
    pub password_hash: PasswordHash,
    pub profile: ProfileDetails,
    pub is_admin: bool,
    pub privacy: PrivacySettings,
    pub notifications: NotificationPreferences,
}

impl NewUser {
    /// Materialize with the id and timestamp chosen by the store
    pub fn into_user(self, user_id: UserId, created_at: DateTime<Utc>) -> User {
        User {
            user_id,
            display_name: self.display_name,
            email: self.email,
            password_hash: self.password_hash,
            profile: self.profile,
            is_active: true,
            is_admin: self.is_admin,
            email_verified: false,
            email_verified_at: None,
            privacy: self.privacy,
            notifications: self.notifications,
            created_at,
            updated_at: created_at,
        }
    }
}
