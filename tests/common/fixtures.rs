//! Test data fixtures for community-core

use chrono::Utc;
use std::sync::Arc;

use community_core::application::ContentRateLimiter;
use community_core::config::{RateLimitConfig, RateLimitStorageBackend};
use community_core::domain::{
    DisplayName, Email, PasswordHash, PrivacySettings, PrivacyToggle, ProfileDetails, User,
    UserId,
};
use community_core::infrastructure::InMemoryUserRepository;
use community_core::infrastructure::rate_limiter::{
    Clock, CounterStore, InMemoryCounterStore, ManualClock, RateLimiterService,
};

pub const OWNER: UserId = UserId(1);
pub const STRANGER: UserId = UserId(2);
pub const ADMIN: UserId = UserId(3);
pub const DEACTIVATED: UserId = UserId(4);

/// Rate limit config backed by the in-memory store
pub fn test_rate_limit_config() -> RateLimitConfig {
    RateLimitConfig {
        enabled: true,
        storage_backend: RateLimitStorageBackend::Memory,
        store_timeout_ms: 50,
        ..RateLimitConfig::default()
    }
}

/// Limiter over an in-memory shared store, driven by a manual clock
pub fn memory_limiter() -> (RateLimiterService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(InMemoryCounterStore::with_clock(clock.clone()));
    let limiter = RateLimiterService::with_store(Some(store), test_rate_limit_config(), clock.clone())
        .expect("valid test config");
    (limiter, clock)
}

/// Limiter over an arbitrary store, driven by a manual clock
pub fn limiter_with_store(store: Arc<dyn CounterStore>) -> (RateLimiterService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let limiter = RateLimiterService::with_store(Some(store), test_rate_limit_config(), dyn_clock)
        .expect("valid test config");
    (limiter, clock)
}

/// Content limiter over the seeded repository and the given request limiter
pub fn content_limiter(limiter: RateLimiterService) -> ContentRateLimiter {
    ContentRateLimiter::new(Arc::new(limiter), seeded_repository()).expect("valid content limits")
}

/// A fully filled-in user with the given id and privacy settings
pub fn test_user(id: UserId, privacy: PrivacySettings) -> User {
    let mut user = User::register(
        DisplayName::new(format!("member{}", id)).expect("valid display name"),
        Email::new(format!("member{}@example.org", id)).expect("valid email"),
        PasswordHash::from("$argon2id$fixture".to_string()),
        ProfileDetails {
            first_name: Some("Sam".to_string()),
            last_name: Some("Rivera".to_string()),
            bio: Some("Likes trains".to_string()),
            location: Some("Porto".to_string()),
            profile_image_url: Some("https://img.example.org/sam.png".to_string()),
        },
    )
    .into_user(id, Utc::now());
    user.privacy = privacy;
    user.email_verified = true;
    user.email_verified_at = Some(Utc::now());
    user
}

/// Repository with an owner, a stranger, an admin and a deactivated user
pub fn seeded_repository() -> Arc<InMemoryUserRepository> {
    let owner = test_user(
        OWNER,
        PrivacySettings::all_visible()
            .with(PrivacyToggle::EmailPrivate, true)
            .with(PrivacyToggle::LocationPrivate, true),
    );
    let stranger = test_user(STRANGER, PrivacySettings::all_visible());
    let mut admin = test_user(ADMIN, PrivacySettings::registration_default());
    admin.is_admin = true;
    let mut deactivated = test_user(DEACTIVATED, PrivacySettings::all_visible());
    deactivated.deactivate();

    Arc::new(InMemoryUserRepository::with_users(vec![
        owner,
        stranger,
        admin,
        deactivated,
    ]))
}
