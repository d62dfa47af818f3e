//! Viewer-scoped projection of user records
//!
//! Loads a subject once, asks the [`VisibilityPolicy`] which fields the viewer
//! may see, and copies only those fields into a [`ProjectedUserView`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::domain::{
    IUserRepository, NotificationPreferences, PrivacySettings, ProfileError, ProfileField, User,
    UserId, ViewScope, ViewerContext, VisibilityPolicy, VisibleFields,
};

/// A user record narrowed to what one viewer may see
///
/// Absent fields are omitted from the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedUserView {
    #[serde(skip)]
    pub scope: ViewScope,
    pub id: UserId,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy_settings: Option<PrivacySettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_preferences: Option<NotificationPreferences>,
}

impl ProjectedUserView {
    /// Copy the visible fields of `user` into a view
    pub fn build(user: &User, visible: &VisibleFields) -> Self {
        let show = |field: ProfileField| visible.contains(field);
        let pick = |field: ProfileField, value: &Option<String>| {
            if show(field) { value.clone() } else { None }
        };

        Self {
            scope: visible.scope(),
            id: user.user_id,
            display_name: user.display_name.as_str().to_string(),
            profile_image_url: pick(ProfileField::ProfileImageUrl, &user.profile.profile_image_url),
            email: show(ProfileField::Email).then(|| user.email.as_str().to_string()),
            first_name: pick(ProfileField::FirstName, &user.profile.first_name),
            last_name: pick(ProfileField::LastName, &user.profile.last_name),
            bio: pick(ProfileField::Bio, &user.profile.bio),
            location: pick(ProfileField::Location, &user.profile.location),
            created_at: show(ProfileField::CreatedAt).then_some(user.created_at),
            is_active: show(ProfileField::IsActive).then_some(user.is_active),
            is_admin: show(ProfileField::IsAdmin).then_some(user.is_admin),
            email_verified: show(ProfileField::EmailVerified).then_some(user.email_verified),
            email_verified_at: if show(ProfileField::EmailVerifiedAt) {
                user.email_verified_at
            } else {
                None
            },
            privacy_settings: show(ProfileField::PrivacySettings).then(|| user.privacy.clone()),
            notification_preferences: show(ProfileField::NotificationPreferences)
                .then_some(user.notifications),
        }
    }

    /// Fields that carry a value in this view
    pub fn present_fields(&self) -> BTreeSet<ProfileField> {
        let present = [
            (ProfileField::Id, true),
            (ProfileField::DisplayName, true),
            (ProfileField::ProfileImageUrl, self.profile_image_url.is_some()),
            (ProfileField::Email, self.email.is_some()),
            (ProfileField::FirstName, self.first_name.is_some()),
            (ProfileField::LastName, self.last_name.is_some()),
            (ProfileField::Bio, self.bio.is_some()),
            (ProfileField::Location, self.location.is_some()),
            (ProfileField::CreatedAt, self.created_at.is_some()),
            (ProfileField::IsActive, self.is_active.is_some()),
            (ProfileField::IsAdmin, self.is_admin.is_some()),
            (ProfileField::EmailVerified, self.email_verified.is_some()),
            (ProfileField::EmailVerifiedAt, self.email_verified_at.is_some()),
            (ProfileField::PrivacySettings, self.privacy_settings.is_some()),
            (
                ProfileField::NotificationPreferences,
                self.notification_preferences.is_some(),
            ),
        ];

        present
            .into_iter()
            .filter_map(|(field, is_present)| is_present.then_some(field))
            .collect()
    }
}

/// Read-only service projecting user records for a viewer
pub struct ProfileProjectionService {
    user_repository: Arc<dyn IUserRepository>,
}

impl ProfileProjectionService {
    pub fn new(user_repository: Arc<dyn IUserRepository>) -> Self {
        Self { user_repository }
    }

    /// Project one user for `viewer`
    ///
    /// Missing users and deactivated users the viewer may not see both yield
    /// [`ProfileError::NotFound`].
    #[instrument(skip(self, viewer), fields(subject_id = %subject_id))]
    pub async fn project(
        &self,
        subject_id: UserId,
        viewer: &ViewerContext,
    ) -> Result<ProjectedUserView, ProfileError> {
        let subject = self
            .user_repository
            .find_by_id(subject_id)
            .await?
            .ok_or(ProfileError::NotFound)?;

        Self::project_loaded(&subject, viewer).ok_or(ProfileError::NotFound)
    }

    /// Project a page of the user directory, keeping repository order
    ///
    /// Users the viewer may not see are left out rather than failing the page.
    #[instrument(skip(self, viewer))]
    pub async fn list_directory(
        &self,
        offset: u64,
        limit: u64,
        viewer: &ViewerContext,
    ) -> Result<Vec<ProjectedUserView>, ProfileError> {
        let users = self.user_repository.list(offset, limit).await?;
        let total = users.len();

        let views: Vec<_> = users
            .iter()
            .filter_map(|user| Self::project_loaded(user, viewer))
            .collect();

        debug!(listed = total, visible = views.len(), "Projected directory page");
        Ok(views)
    }

    fn project_loaded(subject: &User, viewer: &ViewerContext) -> Option<ProjectedUserView> {
        if !subject.is_active && !viewer.has_full_access_to(subject.user_id) {
            return None;
        }

        let visible = VisibilityPolicy::visible_fields(subject, viewer);
        Some(ProjectedUserView::build(subject, &visible))
    }
}
