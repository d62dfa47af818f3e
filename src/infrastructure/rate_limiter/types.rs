//! Rate limiter types and core data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{MAX_WINDOW_SECONDS, RateLimitPolicyConfig, Validate, ValidationError};

/// Stable per-caller key: `user:<id>` or `ip:<hash prefix>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub(crate) fn from_raw(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key used in the shared counter store
    pub fn to_store_key(&self, prefix: &str, window_seconds: u64) -> String {
        format!("{}:{}:{}", prefix, self.0, window_seconds)
    }

    /// Key used in the local fallback map
    pub fn to_local_key(&self, window_seconds: u64) -> String {
        format!("{}:{}", self.0, window_seconds)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated limit, window and optional burst cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    limit: u32,
    window_seconds: u64,
    burst_limit: Option<u32>,
}

impl RateLimitPolicy {
    pub fn new(
        limit: u32,
        window_seconds: u64,
        burst_limit: Option<u32>,
    ) -> Result<Self, ValidationError> {
        let config = RateLimitPolicyConfig {
            limit,
            window_seconds,
            burst_limit,
        };
        config.validate()?;
        Ok(Self {
            limit,
            window_seconds,
            burst_limit,
        })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    pub fn burst_limit(&self) -> Option<u32> {
        self.burst_limit
    }

    /// Count at which requests stop being admitted
    pub fn ceiling(&self) -> u32 {
        match self.burst_limit {
            Some(burst) => burst.min(self.limit),
            None => self.limit,
        }
    }

    /// Reason for a denial observed at `count`
    pub(crate) fn denial_reason(&self, count: u64, degraded: bool) -> DecisionReason {
        let burst_hit = self
            .burst_limit
            .is_some_and(|burst| count >= u64::from(burst));

        match (burst_hit, degraded) {
            (true, false) => DecisionReason::BurstLimitExceeded,
            (true, true) => DecisionReason::BurstLimitExceededLocal,
            (false, false) => DecisionReason::RateLimitExceeded,
            (false, true) => DecisionReason::RateLimitExceededLocal,
        }
    }
}

impl TryFrom<RateLimitPolicyConfig> for RateLimitPolicy {
    type Error = ValidationError;

    fn try_from(config: RateLimitPolicyConfig) -> Result<Self, Self::Error> {
        Self::new(config.limit, config.window_seconds, config.burst_limit)
    }
}

/// Why a decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Allowed,
    RateLimitExceeded,
    BurstLimitExceeded,
    AllowedLocal,
    RateLimitExceededLocal,
    BurstLimitExceededLocal,
    /// Rate limiting is switched off
    Disabled,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::Allowed => "allowed",
            DecisionReason::RateLimitExceeded => "rate_limit_exceeded",
            DecisionReason::BurstLimitExceeded => "burst_limit_exceeded",
            DecisionReason::AllowedLocal => "allowed_local",
            DecisionReason::RateLimitExceededLocal => "rate_limit_exceeded_local",
            DecisionReason::BurstLimitExceededLocal => "burst_limit_exceeded_local",
            DecisionReason::Disabled => "disabled",
        }
    }

    /// Decision was made by the local fallback cache
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            DecisionReason::AllowedLocal
                | DecisionReason::RateLimitExceededLocal
                | DecisionReason::BurstLimitExceededLocal
        )
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Maximum requests allowed in the window
    pub limit: u32,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// When the current window ends
    pub reset_time: DateTime<Utc>,
    pub reason: DecisionReason,
}

impl RateLimitDecision {
    pub(crate) fn allowed(
        limit: u32,
        remaining: u32,
        reset_time: DateTime<Utc>,
        reason: DecisionReason,
    ) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_time,
            reason,
        }
    }

    pub(crate) fn denied(limit: u32, reset_time: DateTime<Utc>, reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_time,
            reason,
        }
    }

    /// Decision for one window given the count seen before this request
    ///
    /// `admitted` says whether the request was counted; it can be false for
    /// a window with room when another window of the same check refused.
    pub(crate) fn for_window(
        policy: &RateLimitPolicy,
        count_before: u64,
        reset_time: DateTime<Utc>,
        admitted: bool,
        degraded: bool,
    ) -> Self {
        if count_before >= u64::from(policy.ceiling()) {
            return Self::denied(
                policy.limit(),
                reset_time,
                policy.denial_reason(count_before, degraded),
            );
        }

        let used = if admitted { count_before + 1 } else { count_before };
        let remaining = u64::from(policy.limit()).saturating_sub(used);
        let reason = if degraded {
            DecisionReason::AllowedLocal
        } else {
            DecisionReason::Allowed
        };
        Self::allowed(
            policy.limit(),
            u32::try_from(remaining).unwrap_or(u32::MAX),
            reset_time,
            reason,
        )
    }

    /// Seconds until the caller may retry (only meaningful when denied)
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_time - now).num_milliseconds();
        u64::try_from(millis)
            .map(|millis| millis.div_ceil(1000))
            .unwrap_or(0)
            .max(1)
    }
}

/// One request checked against several windows at once
///
/// The request is counted in every window or in none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiWindowDecision {
    pub allowed: bool,
    /// Per-window view in the order the policies were given. A window
    /// reports `allowed` when it had room for the request.
    pub windows: Vec<RateLimitDecision>,
}

impl MultiWindowDecision {
    pub(crate) fn from_windows(windows: Vec<RateLimitDecision>) -> Self {
        Self {
            allowed: windows.iter().all(|window| window.allowed),
            windows,
        }
    }

    /// Index of the first window that refused the request
    pub fn blocked_by(&self) -> Option<usize> {
        self.windows.iter().position(|window| !window.allowed)
    }

    /// Latest reset among the refusing windows
    pub fn retry_at(&self) -> Option<DateTime<Utc>> {
        self.windows
            .iter()
            .filter(|window| !window.allowed)
            .map(|window| window.reset_time)
            .max()
    }
}

/// Read-only view of one window's counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowUsage {
    /// Requests counted in the current window
    pub used: u64,
    pub limit: u32,
    /// `None` when no window is open
    pub reset_time: Option<DateTime<Utc>>,
}

/// Outcome of an atomic read-check-increment against a counter store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterHit {
    /// Count observed before this call
    pub count_before: u64,
    /// Milliseconds left in the window
    pub ttl_millis: u64,
    /// Whether the counter was incremented (request admitted)
    pub incremented: bool,
}

impl CounterHit {
    /// Time until the window ends, rounded up to whole seconds
    pub fn reset_after(&self) -> chrono::Duration {
        millis_rounded_up(self.ttl_millis)
    }
}

/// Counter state read without counting a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub count: u64,
    /// Milliseconds left in the window
    pub ttl_millis: u64,
}

impl CounterSnapshot {
    pub fn reset_after(&self) -> chrono::Duration {
        millis_rounded_up(self.ttl_millis)
    }
}

/// One counter to observe in a multi-window hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowCounter {
    pub key: String,
    pub window_seconds: u64,
    /// Count at which the request is refused
    pub ceiling: u64,
}

fn millis_rounded_up(millis: u64) -> chrono::Duration {
    let seconds = millis.div_ceil(1000).min(MAX_WINDOW_SECONDS);
    chrono::Duration::seconds(seconds as i64)
}

/// Failure talking to a counter store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CounterStoreError {
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),

    #[error("Counter store did not answer within {0} ms")]
    Timeout(u64),

    #[error("Unexpected counter store reply: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_key_embeds_window() {
        let key = IdentityKey::from_raw("user:42".to_string());
        assert_eq!(key.to_store_key("rate_limit", 60), "rate_limit:user:42:60");
        assert_eq!(key.to_local_key(60), "user:42:60");
    }

    #[test]
    fn test_policy_rejects_malformed_parameters() {
        assert!(RateLimitPolicy::new(0, 60, None).is_err());
        assert!(RateLimitPolicy::new(10, 0, None).is_err());
        assert!(RateLimitPolicy::new(10, 60, Some(0)).is_err());
        assert!(RateLimitPolicy::new(10, 60, Some(3)).is_ok());
    }

    #[test]
    fn test_ceiling_is_tighter_cap() {
        let policy = RateLimitPolicy::new(10, 60, Some(3)).unwrap();
        assert_eq!(policy.ceiling(), 3);

        let loose_burst = RateLimitPolicy::new(10, 60, Some(50)).unwrap();
        assert_eq!(loose_burst.ceiling(), 10);
    }

    #[test]
    fn test_denial_reason_prefers_burst() {
        let policy = RateLimitPolicy::new(5, 60, Some(5)).unwrap();
        assert_eq!(
            policy.denial_reason(5, false),
            DecisionReason::BurstLimitExceeded
        );

        let policy = RateLimitPolicy::new(5, 60, Some(8)).unwrap();
        assert_eq!(
            policy.denial_reason(5, true),
            DecisionReason::RateLimitExceededLocal
        );
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(DecisionReason::AllowedLocal.as_str(), "allowed_local");
        assert!(DecisionReason::BurstLimitExceededLocal.is_degraded());
        assert!(!DecisionReason::RateLimitExceeded.is_degraded());
    }

    #[test]
    fn test_retry_after_is_at_least_one_second() {
        let now = Utc::now();
        let decision = RateLimitDecision::denied(5, now, DecisionReason::RateLimitExceeded);
        assert_eq!(decision.retry_after_seconds(now), 1);

        let decision = RateLimitDecision::denied(
            5,
            now + chrono::Duration::seconds(30),
            DecisionReason::RateLimitExceeded,
        );
        assert_eq!(decision.retry_after_seconds(now), 30);

        let decision = RateLimitDecision::denied(
            5,
            now + chrono::Duration::milliseconds(29_200),
            DecisionReason::RateLimitExceeded,
        );
        assert_eq!(decision.retry_after_seconds(now), 30);
    }

    #[test]
    fn test_reset_after_rounds_up() {
        let hit = CounterHit {
            count_before: 1,
            ttl_millis: 59_500,
            incremented: false,
        };
        assert_eq!(hit.reset_after(), chrono::Duration::seconds(60));

        let exact = CounterHit {
            ttl_millis: 60_000,
            ..hit
        };
        assert_eq!(exact.reset_after(), chrono::Duration::seconds(60));
    }

    #[test]
    fn test_window_with_room_is_not_counted_when_refused_elsewhere() {
        let policy = RateLimitPolicy::new(10, 3600, None).unwrap();
        let reset = Utc::now();

        let decision = RateLimitDecision::for_window(&policy, 4, reset, false, false);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 6);

        let decision = RateLimitDecision::for_window(&policy, 4, reset, true, false);
        assert_eq!(decision.remaining, 5);
    }

    #[test]
    fn test_multi_window_blocked_by_first_full_window() {
        let now = Utc::now();
        let hourly = RateLimitPolicy::new(10, 3600, None).unwrap();
        let daily = RateLimitPolicy::new(20, 86400, None).unwrap();

        let decision = MultiWindowDecision::from_windows(vec![
            RateLimitDecision::for_window(&hourly, 3, now, false, false),
            RateLimitDecision::for_window(&daily, 20, now + chrono::Duration::hours(5), false, false),
        ]);

        assert!(!decision.allowed);
        assert_eq!(decision.blocked_by(), Some(1));
        assert_eq!(decision.retry_at(), Some(now + chrono::Duration::hours(5)));
    }
}
