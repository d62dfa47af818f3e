//! Content creation limits for authors
//!
//! Each content type is counted per author in a burst window and in hourly,
//! daily and (for creation types) weekly windows. The caps depend on the
//! author's tier, which follows account age unless the caller marks the
//! author as trusted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::ValidationError;
use crate::domain::{IUserRepository, ProfileError, User, UserId, ViewerContext};
use crate::infrastructure::rate_limiter::{
    ContentLimits, ContentType, ContentWindow, CounterStoreError, IdentityKey, RateLimitDecision,
    RateLimitPolicy, RateLimiterService, UserTier, WindowUsage,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentLimitError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("Rate limit store error: {0}")]
    Store(#[from] CounterStoreError),
}

/// One window's part of a content decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentWindowDecision {
    pub window: ContentWindow,
    #[serde(flatten)]
    pub decision: RateLimitDecision,
}

/// Whether an author may create one more item of a content type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentDecision {
    pub allowed: bool,
    pub content_type: ContentType,
    pub tier: UserTier,
    /// First refusing window in burst, hourly, daily, weekly order
    pub limit_type: Option<ContentWindow>,
    pub windows: Vec<ContentWindowDecision>,
}

impl ContentDecision {
    pub fn window(&self, window: ContentWindow) -> Option<&RateLimitDecision> {
        self.windows
            .iter()
            .find(|entry| entry.window == window)
            .map(|entry| &entry.decision)
    }

    pub fn remaining(&self, window: ContentWindow) -> Option<u32> {
        self.window(window).map(|decision| decision.remaining)
    }

    /// Seconds until every refusing window has reset; `None` when allowed
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> Option<u64> {
        self.windows
            .iter()
            .filter(|entry| !entry.decision.allowed)
            .map(|entry| entry.decision.retry_after_seconds(now))
            .max()
    }

    /// Decided by the local fallback cache
    pub fn is_degraded(&self) -> bool {
        self.windows
            .iter()
            .any(|entry| entry.decision.reason.is_degraded())
    }
}

/// Counters for one content type of one author
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentUsage {
    pub content_type: ContentType,
    pub windows: BTreeMap<ContentWindow, WindowUsage>,
    /// End of the burst window while it is full
    pub locked_until: Option<DateTime<Utc>>,
}

/// Administrator view of an author's content counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentUsageReport {
    pub user_id: UserId,
    /// Tier by account age; trust is not recorded on the account
    pub tier: UserTier,
    /// Content types with at least one counted item
    pub usage: Vec<ContentUsage>,
}

pub type ContentLimitsTable = BTreeMap<ContentType, BTreeMap<UserTier, ContentLimits>>;

/// Content limiter on top of the shared request limiter
pub struct ContentRateLimiter {
    limiter: Arc<RateLimiterService>,
    user_repository: Arc<dyn IUserRepository>,
    policies: HashMap<(ContentType, UserTier), Vec<(ContentWindow, RateLimitPolicy)>>,
}

impl ContentRateLimiter {
    pub fn new(
        limiter: Arc<RateLimiterService>,
        user_repository: Arc<dyn IUserRepository>,
    ) -> Result<Self, ValidationError> {
        let config = &limiter.config().content;
        let mut policies = HashMap::new();
        for content_type in ContentType::ALL {
            for tier in UserTier::ALL {
                let windows = ContentLimits::defaults(content_type, tier).policies(config)?;
                policies.insert((content_type, tier), windows);
            }
        }

        Ok(Self {
            limiter,
            user_repository,
            policies,
        })
    }

    pub fn tier_for(&self, author: &User, trusted: bool) -> UserTier {
        UserTier::for_account(
            author.created_at,
            self.limiter.now(),
            trusted,
            &self.limiter.config().content,
        )
    }

    /// Decide and count one item of `content_type` by `author`
    ///
    /// The item is counted in every window or, when any window refuses, in
    /// none of them.
    #[instrument(skip(self, author), fields(user_id = %author.user_id, content_type = %content_type))]
    pub async fn check(
        &self,
        author: &User,
        trusted: bool,
        content_type: ContentType,
    ) -> ContentDecision {
        let tier = self.tier_for(author, trusted);
        let windows = self.windows(content_type, tier);
        let policies: Vec<RateLimitPolicy> = windows.iter().map(|(_, policy)| *policy).collect();
        let identity = IdentityKey::for_content(author.user_id, content_type);

        let decision = self.limiter.check_windows(&identity, &policies).await;
        let limit_type = decision
            .blocked_by()
            .and_then(|index| windows.get(index))
            .map(|(window, _)| *window);

        if let Some(window) = limit_type {
            warn!(tier = %tier, window = %window, "Content rate limit exceeded");
        }

        ContentDecision {
            allowed: decision.allowed,
            content_type,
            tier,
            limit_type,
            windows: windows
                .iter()
                .zip(decision.windows)
                .map(|((window, _), decision)| ContentWindowDecision {
                    window: *window,
                    decision,
                })
                .collect(),
        }
    }

    /// Per-content-type counters of one user (administrators only)
    #[instrument(skip(self, actor), fields(user_id = %user_id))]
    pub async fn user_usage(
        &self,
        actor: &ViewerContext,
        user_id: UserId,
    ) -> Result<ContentUsageReport, ContentLimitError> {
        require_admin(actor)?;
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or(ProfileError::NotFound)?;
        let tier = self.tier_for(&user, false);

        let mut usage = Vec::new();
        for content_type in ContentType::ALL {
            let identity = IdentityKey::for_content(user_id, content_type);
            let mut windows = BTreeMap::new();
            for (window, policy) in self.windows(content_type, tier) {
                windows.insert(*window, self.limiter.usage(&identity, policy).await);
            }

            if windows.values().all(|window| window.used == 0) {
                continue;
            }

            let locked_until = windows
                .get(&ContentWindow::Burst)
                .filter(|burst| burst.used >= u64::from(burst.limit))
                .and_then(|burst| burst.reset_time);

            usage.push(ContentUsage {
                content_type,
                windows,
                locked_until,
            });
        }

        Ok(ContentUsageReport {
            user_id,
            tier,
            usage,
        })
    }

    /// Drop a user's content counters for one type or all (administrators only)
    #[instrument(skip(self, actor), fields(user_id = %user_id))]
    pub async fn clear_user_limits(
        &self,
        actor: &ViewerContext,
        user_id: UserId,
        content_type: Option<ContentType>,
    ) -> Result<(), ContentLimitError> {
        require_admin(actor)?;

        let config = &self.limiter.config().content;
        let content_types = match content_type {
            Some(content_type) => vec![content_type],
            None => ContentType::ALL.to_vec(),
        };

        for content_type in content_types {
            let identity = IdentityKey::for_content(user_id, content_type);
            for window in ContentWindow::ALL {
                self.limiter.reset(&identity, window.seconds(config)).await?;
            }
        }

        info!(
            user_id = %user_id,
            content_type = content_type.map(|content_type| content_type.as_str()),
            "Content limits cleared"
        );
        Ok(())
    }

    /// Caps for every content type and tier (administrators only)
    pub fn limits_table(
        &self,
        actor: &ViewerContext,
    ) -> Result<ContentLimitsTable, ContentLimitError> {
        require_admin(actor)?;

        Ok(ContentType::ALL
            .into_iter()
            .map(|content_type| {
                let by_tier = UserTier::ALL
                    .into_iter()
                    .map(|tier| (tier, ContentLimits::defaults(content_type, tier)))
                    .collect();
                (content_type, by_tier)
            })
            .collect())
    }

    fn windows(
        &self,
        content_type: ContentType,
        tier: UserTier,
    ) -> &[(ContentWindow, RateLimitPolicy)] {
        self.policies
            .get(&(content_type, tier))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn require_admin(actor: &ViewerContext) -> Result<(), ProfileError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ProfileError::InsufficientPermissions)
    }
}
