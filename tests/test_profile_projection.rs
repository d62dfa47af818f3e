//! Profile projection and account use cases over the in-memory repository

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::*;
use community_core::application::{
    ProfileProjectionService, ProfileUpdate, RegisterUser, UserAccountService,
};
use community_core::domain::{
    IUserRepository, PrivacyToggle, ProfileDetails, ProfileError, ProfileField, UserId,
    ViewScope, ViewerContext,
};
use community_core::infrastructure::{InMemoryUserRepository, PasswordHasher};

fn projection() -> ProfileProjectionService {
    ProfileProjectionService::new(seeded_repository())
}

fn accounts(repository: Arc<InMemoryUserRepository>) -> UserAccountService {
    let hasher = PasswordHasher::with_params(4096, 1, 1).unwrap();
    UserAccountService::new(repository, hasher)
}

fn registration(name: &str) -> RegisterUser {
    RegisterUser {
        display_name: name.to_string(),
        email: format!("{}@example.org", name),
        password: "Str0ng!pass".to_string(),
        profile: ProfileDetails::default(),
    }
}

// ============================================================================
// Projection
// ============================================================================

#[tokio::test]
async fn test_owner_sees_everything() {
    let view = projection()
        .project(OWNER, &ViewerContext::user(OWNER))
        .await
        .unwrap();

    assert_eq!(view.scope, ViewScope::Private);
    assert!(view.email.is_some());
    assert!(view.location.is_some());
    assert!(view.privacy_settings.is_some());
    assert_eq!(view.present_fields().len(), ProfileField::ALL.len());
}

#[tokio::test]
async fn test_admin_sees_everything() {
    let view = projection()
        .project(OWNER, &ViewerContext::admin(ADMIN))
        .await
        .unwrap();

    assert_eq!(view.scope, ViewScope::Private);
    assert!(view.email.is_some());
    assert!(view.location.is_some());
}

#[tokio::test]
async fn test_stranger_sees_only_unhidden_fields() {
    let view = projection()
        .project(OWNER, &ViewerContext::user(STRANGER))
        .await
        .unwrap();

    assert_eq!(view.scope, ViewScope::Public);
    assert_eq!(view.email, None);
    assert_eq!(view.location, None);
    assert_eq!(view.bio.as_deref(), Some("Likes trains"));
    assert_eq!(view.first_name.as_deref(), Some("Sam"));
    assert!(view.created_at.is_some());
    assert_eq!(view.is_admin, None);
    assert_eq!(view.notification_preferences, None);
}

#[tokio::test]
async fn test_anonymous_matches_stranger_view() {
    let service = projection();
    let anonymous = service
        .project(OWNER, &ViewerContext::anonymous())
        .await
        .unwrap();
    let stranger = service
        .project(OWNER, &ViewerContext::user(STRANGER))
        .await
        .unwrap();

    assert_eq!(anonymous, stranger);
}

#[tokio::test]
async fn test_missing_and_deactivated_are_indistinguishable() {
    let service = projection();
    let viewer = ViewerContext::user(STRANGER);

    let missing = service.project(UserId(999), &viewer).await.unwrap_err();
    let deactivated = service.project(DEACTIVATED, &viewer).await.unwrap_err();

    assert_eq!(missing, ProfileError::NotFound);
    assert_eq!(deactivated, ProfileError::NotFound);
    assert_eq!(missing.public_message(), deactivated.public_message());
}

#[tokio::test]
async fn test_deactivated_visible_to_self_and_admin() {
    let service = projection();

    let own = service
        .project(DEACTIVATED, &ViewerContext::user(DEACTIVATED))
        .await
        .unwrap();
    assert_eq!(own.is_active, Some(false));

    assert!(
        service
            .project(DEACTIVATED, &ViewerContext::admin(ADMIN))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_directory_keeps_order_and_skips_deactivated() {
    let service = projection();

    let public: Vec<_> = service
        .list_directory(0, 10, &ViewerContext::anonymous())
        .await
        .unwrap()
        .into_iter()
        .map(|view| view.id)
        .collect();
    assert_eq!(public, vec![OWNER, STRANGER, ADMIN]);

    let admin: Vec<_> = service
        .list_directory(0, 10, &ViewerContext::admin(ADMIN))
        .await
        .unwrap()
        .into_iter()
        .map(|view| view.id)
        .collect();
    assert_eq!(admin, vec![OWNER, STRANGER, ADMIN, DEACTIVATED]);
}

#[tokio::test]
async fn test_directory_projects_each_user_independently() {
    let views = projection()
        .list_directory(0, 2, &ViewerContext::user(STRANGER))
        .await
        .unwrap();

    // OWNER hides email; STRANGER is looking at themself
    assert_eq!(views[0].email, None);
    assert_eq!(views[0].scope, ViewScope::Public);
    assert!(views[1].email.is_some());
    assert_eq!(views[1].scope, ViewScope::Private);
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn test_register_creates_active_user_with_hidden_email() {
    let repository = Arc::new(InMemoryUserRepository::new());
    let service = accounts(repository.clone());

    let user = service.register(registration("newcomer")).await.unwrap();

    assert!(user.is_active);
    assert!(!user.is_admin);
    assert!(user.privacy.is_hidden(PrivacyToggle::EmailPrivate));
    assert!(user.password_hash.as_str().starts_with("$argon2id$"));
    assert!(repository.find_by_id(user.user_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_input() {
    let service = accounts(Arc::new(InMemoryUserRepository::new()));
    service.register(registration("taken")).await.unwrap();

    let err = service.register(registration("taken")).await.unwrap_err();
    assert_eq!(err, ProfileError::DisplayNameTaken);

    let mut same_email = registration("other");
    same_email.email = "taken@example.org".to_string();
    assert_eq!(
        service.register(same_email).await.unwrap_err(),
        ProfileError::EmailTaken
    );

    let mut weak = registration("weakling");
    weak.password = "short".to_string();
    assert!(matches!(
        service.register(weak).await,
        Err(ProfileError::WeakPassword { .. })
    ));

    let mut bad_name = registration("x");
    bad_name.email = "x@example.org".to_string();
    assert!(matches!(
        service.register(bad_name).await,
        Err(ProfileError::InvalidDisplayName { .. })
    ));
}

#[tokio::test]
async fn test_update_profile_is_self_only() {
    let service = accounts(seeded_repository());
    let update = ProfileUpdate {
        profile: Some(ProfileDetails::default()),
        ..Default::default()
    };

    let err = service
        .update_profile(&ViewerContext::user(STRANGER), OWNER, update)
        .await
        .unwrap_err();
    assert_eq!(err, ProfileError::InsufficientPermissions);
}

#[tokio::test]
async fn test_privacy_change_is_reflected_in_projection() {
    let repository = seeded_repository();
    let service = accounts(repository.clone());
    let projection = ProfileProjectionService::new(repository);

    let mut privacy = BTreeMap::new();
    privacy.insert(PrivacyToggle::BioPrivate, true);
    privacy.insert(PrivacyToggle::LocationPrivate, false);
    service
        .update_profile(
            &ViewerContext::user(OWNER),
            OWNER,
            ProfileUpdate {
                privacy,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let view = projection
        .project(OWNER, &ViewerContext::anonymous())
        .await
        .unwrap();
    assert_eq!(view.bio, None);
    assert_eq!(view.location.as_deref(), Some("Porto"));
}

#[tokio::test]
async fn test_rename_to_taken_name_fails() {
    let service = accounts(seeded_repository());

    let err = service
        .update_profile(
            &ViewerContext::user(OWNER),
            OWNER,
            ProfileUpdate {
                display_name: Some(format!("member{}", STRANGER)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, ProfileError::DisplayNameTaken);
}

#[tokio::test]
async fn test_set_active_requires_admin() {
    let repository = seeded_repository();
    let service = accounts(repository.clone());
    let projection = ProfileProjectionService::new(repository);

    let err = service
        .set_active(&ViewerContext::user(OWNER), STRANGER, false)
        .await
        .unwrap_err();
    assert_eq!(err, ProfileError::InsufficientPermissions);

    let user = service
        .set_active(&ViewerContext::admin(ADMIN), STRANGER, false)
        .await
        .unwrap();
    assert!(!user.is_active);
    assert_eq!(
        projection
            .project(STRANGER, &ViewerContext::anonymous())
            .await
            .unwrap_err(),
        ProfileError::NotFound
    );

    service
        .set_active(&ViewerContext::admin(ADMIN), STRANGER, true)
        .await
        .unwrap();
    assert!(
        projection
            .project(STRANGER, &ViewerContext::anonymous())
            .await
            .is_ok()
    );
}
