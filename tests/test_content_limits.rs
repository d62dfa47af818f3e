//! Test suite for content creation limits
//!
//! Tests cover:
//! - Tier selection from account age
//! - Longer windows refusing without charging shorter ones
//! - Administrator usage reads and counter clearing
//! - Degraded decisions when the shared store is down

mod common;

use chrono::Duration as ChronoDuration;
use common::*;
use community_core::application::ContentLimitError;
use community_core::domain::{PrivacySettings, ProfileError, UserId, ViewerContext};
use community_core::infrastructure::rate_limiter::{
    Clock, ContentType, ContentWindow, CounterStoreError, UserTier,
};

fn admin() -> ViewerContext {
    ViewerContext::admin(ADMIN)
}

// ============================================================================
// Decisions
// ============================================================================

#[tokio::test]
async fn test_tier_moves_with_account_age() {
    let (limiter, clock) = memory_limiter();
    let limiter = content_limiter(limiter);
    let author = test_user(OWNER, PrivacySettings::all_visible());

    clock.set(author.created_at + ChronoDuration::days(1));
    assert_eq!(limiter.tier_for(&author, false), UserTier::New);

    clock.set(author.created_at + ChronoDuration::days(10));
    assert_eq!(limiter.tier_for(&author, false), UserTier::Regular);

    clock.set(author.created_at + ChronoDuration::days(45));
    assert_eq!(limiter.tier_for(&author, false), UserTier::Established);
    assert_eq!(limiter.tier_for(&author, true), UserTier::Trusted);
}

#[tokio::test]
async fn test_hourly_refusal_does_not_charge_burst_window() {
    let (limiter, clock) = memory_limiter();
    let limiter = content_limiter(limiter);
    let author = test_user(OWNER, PrivacySettings::all_visible());
    clock.set(author.created_at);

    // New tier forum posts: 2 per burst window, 5 per hour
    for batch in [2, 2, 1] {
        for _ in 0..batch {
            let decision = limiter.check(&author, false, ContentType::ForumPost).await;
            assert!(decision.allowed);
        }
        clock.advance(ChronoDuration::seconds(301));
    }

    let refused = limiter.check(&author, false, ContentType::ForumPost).await;
    assert!(!refused.allowed);
    assert_eq!(refused.limit_type, Some(ContentWindow::Hourly));
    assert_eq!(refused.remaining(ContentWindow::Burst), Some(2));
    assert_eq!(refused.remaining(ContentWindow::Daily), Some(10));

    let report = limiter.user_usage(&admin(), OWNER).await.unwrap();
    let forum = &report.usage[0];
    assert_eq!(forum.content_type, ContentType::ForumPost);
    assert_eq!(forum.windows[&ContentWindow::Hourly].used, 5);
    assert_eq!(forum.windows[&ContentWindow::Daily].used, 5);
    assert_eq!(forum.windows[&ContentWindow::Burst].used, 0);
    assert_eq!(forum.locked_until, None);
}

#[tokio::test]
async fn test_burst_refusal_retries_after_burst_window() {
    let (limiter, clock) = memory_limiter();
    let limiter = content_limiter(limiter);
    let author = test_user(STRANGER, PrivacySettings::all_visible());
    clock.set(author.created_at);

    for _ in 0..2 {
        limiter.check(&author, false, ContentType::ForumPost).await;
    }
    let refused = limiter.check(&author, false, ContentType::ForumPost).await;
    assert_eq!(refused.limit_type, Some(ContentWindow::Burst));
    let retry_after = refused.retry_after_seconds(clock.now()).unwrap();
    assert_eq!(retry_after, 300);

    clock.advance(ChronoDuration::seconds(retry_after as i64));
    let retried = limiter.check(&author, false, ContentType::ForumPost).await;
    assert!(retried.allowed);
    assert_eq!(retried.remaining(ContentWindow::Hourly), Some(2));
}

// ============================================================================
// Administrator operations
// ============================================================================

#[tokio::test]
async fn test_usage_reports_burst_lockout() {
    let (limiter, clock) = memory_limiter();
    let limiter = content_limiter(limiter);
    let author = test_user(OWNER, PrivacySettings::all_visible());
    clock.set(author.created_at);

    for _ in 0..2 {
        limiter.check(&author, false, ContentType::ForumPost).await;
    }

    let report = limiter.user_usage(&admin(), OWNER).await.unwrap();
    assert_eq!(report.user_id, OWNER);
    assert_eq!(report.tier, UserTier::New);
    assert_eq!(report.usage.len(), 1);
    assert_eq!(
        report.usage[0].locked_until,
        Some(author.created_at + ChronoDuration::seconds(300))
    );
}

#[tokio::test]
async fn test_usage_and_clear_require_admin() {
    let (limiter, _) = memory_limiter();
    let limiter = content_limiter(limiter);
    let viewer = ViewerContext::user(OWNER);

    assert_eq!(
        limiter.user_usage(&viewer, OWNER).await.unwrap_err(),
        ContentLimitError::Profile(ProfileError::InsufficientPermissions)
    );
    assert_eq!(
        limiter
            .clear_user_limits(&viewer, OWNER, None)
            .await
            .unwrap_err(),
        ContentLimitError::Profile(ProfileError::InsufficientPermissions)
    );
}

#[tokio::test]
async fn test_usage_of_unknown_user_is_not_found() {
    let (limiter, _) = memory_limiter();
    let limiter = content_limiter(limiter);

    assert_eq!(
        limiter.user_usage(&admin(), UserId(999)).await.unwrap_err(),
        ContentLimitError::Profile(ProfileError::NotFound)
    );
}

#[tokio::test]
async fn test_clear_one_content_type_keeps_others() {
    let (limiter, clock) = memory_limiter();
    let limiter = content_limiter(limiter);
    let author = test_user(OWNER, PrivacySettings::all_visible());
    clock.set(author.created_at);

    for _ in 0..2 {
        limiter.check(&author, false, ContentType::ForumPost).await;
    }
    limiter.check(&author, false, ContentType::Comment).await;

    limiter
        .clear_user_limits(&admin(), OWNER, Some(ContentType::ForumPost))
        .await
        .unwrap();

    let report = limiter.user_usage(&admin(), OWNER).await.unwrap();
    assert_eq!(report.usage.len(), 1);
    assert_eq!(report.usage[0].content_type, ContentType::Comment);
    assert!(
        limiter
            .check(&author, false, ContentType::ForumPost)
            .await
            .allowed
    );

    limiter.clear_user_limits(&admin(), OWNER, None).await.unwrap();
    let report = limiter.user_usage(&admin(), OWNER).await.unwrap();
    assert!(report.usage.is_empty());
}

// ============================================================================
// Degraded mode
// ============================================================================

#[tokio::test]
async fn test_content_limits_hold_while_store_is_down() {
    let (limiter, clock) = limiter_with_store(unreachable_store());
    let limiter = content_limiter(limiter);
    let author = test_user(OWNER, PrivacySettings::all_visible());
    clock.set(author.created_at);

    for _ in 0..2 {
        let decision = limiter.check(&author, false, ContentType::ForumPost).await;
        assert!(decision.allowed);
        assert!(decision.is_degraded());
    }

    let refused = limiter.check(&author, false, ContentType::ForumPost).await;
    assert!(!refused.allowed);
    assert_eq!(refused.limit_type, Some(ContentWindow::Burst));

    let report = limiter.user_usage(&admin(), OWNER).await.unwrap();
    assert_eq!(report.usage[0].windows[&ContentWindow::Hourly].used, 2);
}

#[tokio::test]
async fn test_clear_reports_store_failure() {
    let (limiter, _) = limiter_with_store(unreachable_store());
    let limiter = content_limiter(limiter);

    let err = limiter
        .clear_user_limits(&admin(), OWNER, Some(ContentType::Comment))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContentLimitError::Store(CounterStoreError::Unavailable(_))
    ));
}
