//! Field-level visibility of user records
//!
//! Every projectable field is bound to a [`FieldPolicy`] in a fixed table.
//! The owner of a record and administrators see everything; other viewers see
//! public fields, toggle-guarded fields whose toggle is not set, and never the
//! owner-only account fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::entities::User;
use super::value_objects::{PrivacySettings, PrivacyToggle, UserId};

/// Identity of the party asking to see a record, built once per request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerContext {
    Anonymous,
    Authenticated { user_id: UserId, is_admin: bool },
}

impl ViewerContext {
    pub fn anonymous() -> Self {
        ViewerContext::Anonymous
    }

    pub fn user(user_id: UserId) -> Self {
        ViewerContext::Authenticated {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        ViewerContext::Authenticated {
            user_id,
            is_admin: true,
        }
    }

    /// Build from an authenticated user record, or anonymous when absent
    pub fn from_user(user: Option<&User>) -> Self {
        match user {
            Some(user) => ViewerContext::Authenticated {
                user_id: user.user_id,
                is_admin: user.is_admin,
            },
            None => ViewerContext::Anonymous,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            ViewerContext::Anonymous => None,
            ViewerContext::Authenticated { user_id, .. } => Some(*user_id),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, ViewerContext::Authenticated { is_admin: true, .. })
    }

    /// The viewer is the subject itself or an administrator
    pub fn has_full_access_to(&self, subject: UserId) -> bool {
        match self {
            ViewerContext::Anonymous => false,
            ViewerContext::Authenticated { user_id, is_admin } => *is_admin || *user_id == subject,
        }
    }
}

/// Which view of a record a viewer receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewScope {
    /// Owner or admin: every field
    Private,
    /// Anyone else: filtered by privacy toggles
    Public,
}

/// A field of the user record that can appear in a projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Id,
    DisplayName,
    Email,
    FirstName,
    LastName,
    Bio,
    Location,
    ProfileImageUrl,
    CreatedAt,
    IsActive,
    IsAdmin,
    EmailVerified,
    EmailVerifiedAt,
    PrivacySettings,
    NotificationPreferences,
}

/// How a field is guarded from viewers without full access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Always visible
    Public,
    /// Visible unless the subject has set this toggle
    Toggle(PrivacyToggle),
    /// Only the subject and administrators see it
    OwnerOnly,
}

impl ProfileField {
    pub const ALL: [ProfileField; 15] = [
        ProfileField::Id,
        ProfileField::DisplayName,
        ProfileField::Email,
        ProfileField::FirstName,
        ProfileField::LastName,
        ProfileField::Bio,
        ProfileField::Location,
        ProfileField::ProfileImageUrl,
        ProfileField::CreatedAt,
        ProfileField::IsActive,
        ProfileField::IsAdmin,
        ProfileField::EmailVerified,
        ProfileField::EmailVerifiedAt,
        ProfileField::PrivacySettings,
        ProfileField::NotificationPreferences,
    ];

    pub fn policy(&self) -> FieldPolicy {
        match self {
            ProfileField::Id | ProfileField::DisplayName | ProfileField::ProfileImageUrl => {
                FieldPolicy::Public
            }
            ProfileField::Email => FieldPolicy::Toggle(PrivacyToggle::EmailPrivate),
            ProfileField::FirstName => FieldPolicy::Toggle(PrivacyToggle::FirstNamePrivate),
            ProfileField::LastName => FieldPolicy::Toggle(PrivacyToggle::LastNamePrivate),
            ProfileField::Bio => FieldPolicy::Toggle(PrivacyToggle::BioPrivate),
            ProfileField::Location => FieldPolicy::Toggle(PrivacyToggle::LocationPrivate),
            ProfileField::CreatedAt => FieldPolicy::Toggle(PrivacyToggle::CreatedAtPrivate),
            ProfileField::IsActive => FieldPolicy::Toggle(PrivacyToggle::IsActivePrivate),
            ProfileField::IsAdmin
            | ProfileField::EmailVerified
            | ProfileField::EmailVerifiedAt
            | ProfileField::PrivacySettings
            | ProfileField::NotificationPreferences => FieldPolicy::OwnerOnly,
        }
    }

    /// The toggle guarding this field, if any
    pub fn toggle(&self) -> Option<PrivacyToggle> {
        match self.policy() {
            FieldPolicy::Toggle(toggle) => Some(toggle),
            FieldPolicy::Public | FieldPolicy::OwnerOnly => None,
        }
    }
}

/// Set of fields a viewer may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleFields {
    scope: ViewScope,
    fields: BTreeSet<ProfileField>,
}

impl VisibleFields {
    pub fn scope(&self) -> ViewScope {
        self.scope
    }

    pub fn contains(&self, field: ProfileField) -> bool {
        self.fields.contains(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = ProfileField> + '_ {
        self.fields.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Pure mapping from (subject, viewer) to the visible field set
pub struct VisibilityPolicy;

impl VisibilityPolicy {
    pub fn visible_fields(subject: &User, viewer: &ViewerContext) -> VisibleFields {
        if viewer.has_full_access_to(subject.user_id) {
            return VisibleFields {
                scope: ViewScope::Private,
                fields: ProfileField::ALL.into_iter().collect(),
            };
        }

        VisibleFields {
            scope: ViewScope::Public,
            fields: Self::public_fields(&subject.privacy).collect(),
        }
    }

    /// Fields visible to a viewer without full access under these settings
    pub fn public_fields(privacy: &PrivacySettings) -> impl Iterator<Item = ProfileField> + '_ {
        ProfileField::ALL
            .into_iter()
            .filter(move |field| match field.policy() {
                FieldPolicy::Public => true,
                FieldPolicy::Toggle(toggle) => !privacy.is_hidden(toggle),
                FieldPolicy::OwnerOnly => false,
            })
    }
}
