//! Content creation limits by content type and account tier

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::types::{IdentityKey, RateLimitPolicy};
use crate::config::{ContentLimitConfig, ValidationError};
use crate::domain::UserId;

/// Kinds of user-created content that are limited separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    ForumPost,
    ForumReply,
    EventCreate,
    ServiceCreate,
    EventReply,
    ServiceReply,
    PrivateMessage,
    NewConversation,
    Comment,
    PollCreate,
    PollVote,
}

impl ContentType {
    pub const ALL: [ContentType; 11] = [
        ContentType::ForumPost,
        ContentType::ForumReply,
        ContentType::EventCreate,
        ContentType::ServiceCreate,
        ContentType::EventReply,
        ContentType::ServiceReply,
        ContentType::PrivateMessage,
        ContentType::NewConversation,
        ContentType::Comment,
        ContentType::PollCreate,
        ContentType::PollVote,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::ForumPost => "forum_post",
            ContentType::ForumReply => "forum_reply",
            ContentType::EventCreate => "event_create",
            ContentType::ServiceCreate => "service_create",
            ContentType::EventReply => "event_reply",
            ContentType::ServiceReply => "service_reply",
            ContentType::PrivateMessage => "private_message",
            ContentType::NewConversation => "new_conversation",
            ContentType::Comment => "comment",
            ContentType::PollCreate => "poll_create",
            ContentType::PollVote => "poll_vote",
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentType::ALL
            .into_iter()
            .find(|content_type| content_type.as_str() == s)
            .ok_or_else(|| format!("Unknown content type: {}", s))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account standing that selects which limits apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserTier {
    New,
    Regular,
    Established,
    Trusted,
}

impl UserTier {
    pub const ALL: [UserTier; 4] = [
        UserTier::New,
        UserTier::Regular,
        UserTier::Established,
        UserTier::Trusted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserTier::New => "new",
            UserTier::Regular => "regular",
            UserTier::Established => "established",
            UserTier::Trusted => "trusted",
        }
    }

    /// Tier for an account created at `created_at`
    ///
    /// Trusted accounts skip the age ladder. A creation time in the future
    /// counts as a brand new account.
    pub fn for_account(
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
        trusted: bool,
        config: &ContentLimitConfig,
    ) -> Self {
        if trusted {
            return UserTier::Trusted;
        }

        let age = now - created_at;
        if age < Duration::days(i64::from(config.new_account_days)) {
            UserTier::New
        } else if age < Duration::days(i64::from(config.regular_account_days)) {
            UserTier::Regular
        } else {
            UserTier::Established
        }
    }
}

impl fmt::Display for UserTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed windows a content type is counted in, in check order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentWindow {
    Burst,
    Hourly,
    Daily,
    Weekly,
}

impl ContentWindow {
    pub const ALL: [ContentWindow; 4] = [
        ContentWindow::Burst,
        ContentWindow::Hourly,
        ContentWindow::Daily,
        ContentWindow::Weekly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentWindow::Burst => "burst",
            ContentWindow::Hourly => "hourly",
            ContentWindow::Daily => "daily",
            ContentWindow::Weekly => "weekly",
        }
    }

    pub fn seconds(&self, config: &ContentLimitConfig) -> u64 {
        match self {
            ContentWindow::Burst => config.burst_window_seconds,
            ContentWindow::Hourly => 3600,
            ContentWindow::Daily => 86_400,
            ContentWindow::Weekly => 604_800,
        }
    }
}

impl fmt::Display for ContentWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-window caps for one content type and tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLimits {
    pub hourly: u32,
    pub daily: u32,
    pub weekly: Option<u32>,
    pub burst: Option<u32>,
}

impl ContentLimits {
    const fn new(hourly: u32, daily: u32, weekly: Option<u32>, burst: u32) -> Self {
        Self {
            hourly,
            daily,
            weekly,
            burst: Some(burst),
        }
    }

    /// Built-in caps for `content_type` at `tier`
    pub fn defaults(content_type: ContentType, tier: UserTier) -> Self {
        let by_tier = match content_type {
            ContentType::ForumPost => [
                Self::new(5, 15, None, 2),
                Self::new(10, 50, None, 3),
                Self::new(15, 75, None, 5),
                Self::new(25, 100, None, 8),
            ],
            ContentType::ForumReply => [
                Self::new(15, 50, None, 5),
                Self::new(30, 200, None, 10),
                Self::new(50, 300, None, 15),
                Self::new(75, 500, None, 20),
            ],
            ContentType::EventCreate => [
                Self::new(1, 2, Some(5), 1),
                Self::new(2, 5, Some(20), 1),
                Self::new(3, 8, Some(30), 2),
                Self::new(5, 15, Some(50), 3),
            ],
            ContentType::ServiceCreate => [
                Self::new(2, 3, Some(10), 1),
                Self::new(3, 8, Some(25), 2),
                Self::new(5, 15, Some(40), 3),
                Self::new(8, 25, Some(60), 4),
            ],
            ContentType::EventReply | ContentType::ServiceReply => [
                Self::new(20, 80, None, 8),
                Self::new(40, 200, None, 15),
                Self::new(60, 300, None, 20),
                Self::new(100, 500, None, 30),
            ],
            ContentType::PrivateMessage => [
                Self::new(30, 100, None, 10),
                Self::new(75, 300, None, 20),
                Self::new(150, 600, None, 30),
                Self::new(250, 1000, None, 50),
            ],
            ContentType::NewConversation => [
                Self::new(5, 20, None, 3),
                Self::new(15, 50, None, 5),
                Self::new(25, 80, None, 8),
                Self::new(40, 120, None, 12),
            ],
            ContentType::Comment => [
                Self::new(25, 100, None, 10),
                Self::new(50, 250, None, 20),
                Self::new(75, 400, None, 25),
                Self::new(120, 600, None, 40),
            ],
            ContentType::PollCreate => [
                Self::new(2, 5, Some(15), 1),
                Self::new(3, 10, Some(30), 2),
                Self::new(5, 15, Some(50), 3),
                Self::new(8, 25, Some(75), 4),
            ],
            ContentType::PollVote => [
                Self::new(50, 200, None, 20),
                Self::new(100, 500, None, 30),
                Self::new(150, 750, None, 40),
                Self::new(200, 1000, None, 50),
            ],
        };

        match tier {
            UserTier::New => by_tier[0],
            UserTier::Regular => by_tier[1],
            UserTier::Established => by_tier[2],
            UserTier::Trusted => by_tier[3],
        }
    }

    /// Cap for one window, `None` when that window is not limited
    pub fn cap(&self, window: ContentWindow) -> Option<u32> {
        match window {
            ContentWindow::Burst => self.burst,
            ContentWindow::Hourly => Some(self.hourly),
            ContentWindow::Daily => Some(self.daily),
            ContentWindow::Weekly => self.weekly,
        }
    }

    /// One policy per limited window, burst first
    pub fn policies(
        &self,
        config: &ContentLimitConfig,
    ) -> Result<Vec<(ContentWindow, RateLimitPolicy)>, ValidationError> {
        ContentWindow::ALL
            .into_iter()
            .filter_map(|window| self.cap(window).map(|cap| (window, cap)))
            .map(|(window, cap)| {
                RateLimitPolicy::new(cap, window.seconds(config), None)
                    .map(|policy| (window, policy))
            })
            .collect()
    }
}

impl IdentityKey {
    /// `user:<id>:<content type>`, counted apart from request limits
    pub fn for_content(user_id: UserId, content_type: ContentType) -> Self {
        IdentityKey::from_raw(format!("user:{}:{}", user_id, content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_follows_account_age() {
        let config = ContentLimitConfig::default();
        let now = Utc::now();
        let tier = |age_days: i64| {
            UserTier::for_account(now - Duration::days(age_days), now, false, &config)
        };

        assert_eq!(tier(0), UserTier::New);
        assert_eq!(tier(6), UserTier::New);
        assert_eq!(tier(7), UserTier::Regular);
        assert_eq!(tier(29), UserTier::Regular);
        assert_eq!(tier(30), UserTier::Established);
        assert_eq!(tier(400), UserTier::Established);
    }

    #[test]
    fn test_trusted_flag_overrides_age() {
        let config = ContentLimitConfig::default();
        let now = Utc::now();
        assert_eq!(
            UserTier::for_account(now, now, true, &config),
            UserTier::Trusted
        );
    }

    #[test]
    fn test_future_creation_time_is_new() {
        let config = ContentLimitConfig::default();
        let now = Utc::now();
        assert_eq!(
            UserTier::for_account(now + Duration::days(3), now, false, &config),
            UserTier::New
        );
    }

    #[test]
    fn test_every_content_type_and_tier_builds_valid_policies() {
        let config = ContentLimitConfig::default();
        for content_type in ContentType::ALL {
            let mut previous_hourly = 0;
            for tier in UserTier::ALL {
                let limits = ContentLimits::defaults(content_type, tier);
                assert!(limits.hourly >= previous_hourly, "{content_type} {tier}");
                previous_hourly = limits.hourly;

                let policies = limits.policies(&config).unwrap();
                assert_eq!(policies[0].0, ContentWindow::Burst);
                assert_eq!(policies[0].1.window_seconds(), 300);
            }
        }
    }

    #[test]
    fn test_weekly_window_only_for_creation_types() {
        let config = ContentLimitConfig::default();
        let windows = |content_type| {
            ContentLimits::defaults(content_type, UserTier::Regular)
                .policies(&config)
                .unwrap()
                .into_iter()
                .map(|(window, _)| window)
                .collect::<Vec<_>>()
        };

        assert_eq!(
            windows(ContentType::EventCreate),
            ContentWindow::ALL.to_vec()
        );
        assert_eq!(
            windows(ContentType::ForumPost),
            vec![
                ContentWindow::Burst,
                ContentWindow::Hourly,
                ContentWindow::Daily
            ]
        );
    }

    #[test]
    fn test_forum_post_limits_for_new_accounts() {
        let limits = ContentLimits::defaults(ContentType::ForumPost, UserTier::New);
        assert_eq!(limits.hourly, 5);
        assert_eq!(limits.daily, 15);
        assert_eq!(limits.weekly, None);
        assert_eq!(limits.burst, Some(2));
    }

    #[test]
    fn test_content_type_parses_wire_names() {
        assert_eq!(
            "poll_vote".parse::<ContentType>(),
            Ok(ContentType::PollVote)
        );
        assert!("wiki_edit".parse::<ContentType>().is_err());
    }

    #[test]
    fn test_content_identity_is_separate_per_type() {
        let post = IdentityKey::for_content(UserId(7), ContentType::ForumPost);
        let reply = IdentityKey::for_content(UserId(7), ContentType::ForumReply);
        assert_eq!(post.as_str(), "user:7:forum_post");
        assert_ne!(post, reply);
        assert_ne!(post, IdentityKey::for_user(UserId(7)));
    }
}
