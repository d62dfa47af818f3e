//! Rate Limiter Service
//!
//! Composes the shared counter store and the local fallback cache into a
//! single allow/deny decision:
//! - Fixed windows keyed by identity and window length
//! - Optional burst cap checked before the window limit
//! - Transparent degraded mode when the shared store fails or is slow

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::local_fallback::LocalFallbackCache;
use super::storage::{
    CounterStore, DragonflyCounterStore, InMemoryCounterStore, window_duration,
};
use super::types::{
    CounterHit, CounterStoreError, DecisionReason, IdentityKey, MultiWindowDecision,
    RateLimitDecision, RateLimitPolicy, WindowCounter, WindowUsage,
};
use crate::config::{CacheConfig, RateLimitConfig, RateLimitStorageBackend, ValidationError};

/// Main rate limiter service
pub struct RateLimiterService {
    /// Shared store; `None` when it could not be reached at start-up
    primary: Option<Arc<dyn CounterStore>>,
    /// Degraded-mode counters
    fallback: LocalFallbackCache,
    clock: Arc<dyn Clock>,
    default_policy: RateLimitPolicy,
    policies: HashMap<String, RateLimitPolicy>,
    config: RateLimitConfig,
}

impl RateLimiterService {
    /// Create the service, connecting to Dragonfly when configured
    ///
    /// A Dragonfly connection failure is not fatal: the service starts
    /// without a shared store and decides every request locally.
    pub async fn new(
        config: RateLimitConfig,
        cache: &CacheConfig,
    ) -> Result<Self, ValidationError> {
        let primary: Option<Arc<dyn CounterStore>> = match config.storage_backend {
            RateLimitStorageBackend::Dragonfly => {
                let timeout = Duration::from_secs(cache.connection_timeout_seconds);
                match DragonflyCounterStore::new(&cache.dragonfly_url, timeout).await {
                    Ok(store) => {
                        info!("Rate limiter using Dragonfly storage backend");
                        Some(Arc::new(store))
                    }
                    Err(e) => {
                        warn!(
                            "Failed to connect to Dragonfly for rate limiting, using local fallback only: {}",
                            e
                        );
                        None
                    }
                }
            }
            RateLimitStorageBackend::Memory => {
                info!("Rate limiter using in-memory storage backend");
                Some(Arc::new(InMemoryCounterStore::new()))
            }
        };

        Self::with_store(primary, config, Arc::new(SystemClock))
    }

    /// Create with an explicit store and clock (for testing)
    pub fn with_store(
        primary: Option<Arc<dyn CounterStore>>,
        config: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ValidationError> {
        let default_policy = RateLimitPolicy::try_from(config.default_policy)?;
        let policies = config
            .policies
            .iter()
            .map(|(name, policy)| {
                RateLimitPolicy::try_from(*policy)
                    .map(|policy| (name.clone(), policy))
                    .map_err(|e| ValidationError::rate_limit(format!("policy '{}': {}", name, e)))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        let fallback = LocalFallbackCache::new(&config.local_fallback, Arc::clone(&clock));

        Ok(Self {
            primary,
            fallback,
            clock,
            default_policy,
            policies,
            config,
        })
    }

    /// Check if rate limiting is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Whether a shared store is attached
    pub fn has_shared_store(&self) -> bool {
        self.primary.is_some()
    }

    /// Named policy, or the default policy when the name is unknown
    pub fn policy(&self, name: &str) -> RateLimitPolicy {
        self.policies
            .get(name)
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// Decide whether one more request from `identity` fits the named policy
    pub async fn check_named(
        &self,
        identity: &IdentityKey,
        policy_name: &str,
    ) -> RateLimitDecision {
        let policy = self.policy(policy_name);
        self.check(identity, &policy).await
    }

    /// Decide whether one more request from `identity` fits `policy`
    ///
    /// Never fails: store errors and timeouts are logged and the decision is
    /// made by the local fallback cache instead.
    pub async fn check(
        &self,
        identity: &IdentityKey,
        policy: &RateLimitPolicy,
    ) -> RateLimitDecision {
        let now = self.clock.now();

        if !self.config.enabled {
            return RateLimitDecision::allowed(
                policy.limit(),
                policy.limit(),
                now + window_duration(policy.window_seconds()),
                DecisionReason::Disabled,
            );
        }

        let Some(store) = &self.primary else {
            return self.fallback.check(identity, policy).await;
        };

        match self.hit_shared(store.as_ref(), identity, policy).await {
            Ok(hit) => Self::decide(hit, policy, now),
            Err(e) => {
                warn!(
                    identity = %identity,
                    backend = store.backend_name(),
                    error = %e,
                    "Shared rate limit store failed, deciding locally"
                );
                self.fallback.check(identity, policy).await
            }
        }
    }

    /// Decide whether one more request fits every policy at once
    ///
    /// The request is counted in all windows or in none, so a refusal by a
    /// long window does not use up a shorter one.
    pub async fn check_windows(
        &self,
        identity: &IdentityKey,
        policies: &[RateLimitPolicy],
    ) -> MultiWindowDecision {
        let now = self.clock.now();

        if !self.config.enabled {
            return MultiWindowDecision::from_windows(
                policies
                    .iter()
                    .map(|policy| {
                        RateLimitDecision::allowed(
                            policy.limit(),
                            policy.limit(),
                            now + window_duration(policy.window_seconds()),
                            DecisionReason::Disabled,
                        )
                    })
                    .collect(),
            );
        }

        let Some(store) = &self.primary else {
            return self.fallback.check_all(identity, policies).await;
        };

        let counters: Vec<WindowCounter> = policies
            .iter()
            .map(|policy| WindowCounter {
                key: identity.to_store_key(&self.config.key_prefix, policy.window_seconds()),
                window_seconds: policy.window_seconds(),
                ceiling: u64::from(policy.ceiling()),
            })
            .collect();

        let hits = tokio::time::timeout(self.store_timeout(), store.hit_all(&counters))
            .await
            .map_err(|_| CounterStoreError::Timeout(self.config.store_timeout_ms))
            .and_then(|result| result);

        match hits {
            Ok(hits) if hits.len() == policies.len() => MultiWindowDecision::from_windows(
                policies
                    .iter()
                    .zip(hits)
                    .map(|(policy, hit)| {
                        RateLimitDecision::for_window(
                            policy,
                            hit.count_before,
                            now + hit.reset_after(),
                            hit.incremented,
                            false,
                        )
                    })
                    .collect(),
            ),
            Ok(hits) => {
                warn!(
                    identity = %identity,
                    backend = store.backend_name(),
                    expected = policies.len(),
                    received = hits.len(),
                    "Shared rate limit store returned a partial reply, deciding locally"
                );
                self.fallback.check_all(identity, policies).await
            }
            Err(e) => {
                warn!(
                    identity = %identity,
                    backend = store.backend_name(),
                    error = %e,
                    "Shared rate limit store failed, deciding locally"
                );
                self.fallback.check_all(identity, policies).await
            }
        }
    }

    /// Current usage of one window, without counting a request
    pub async fn usage(&self, identity: &IdentityKey, policy: &RateLimitPolicy) -> WindowUsage {
        let now = self.clock.now();

        if let Some(store) = &self.primary {
            let key = identity.to_store_key(&self.config.key_prefix, policy.window_seconds());
            let snapshot = tokio::time::timeout(self.store_timeout(), store.peek(&key))
                .await
                .map_err(|_| CounterStoreError::Timeout(self.config.store_timeout_ms))
                .and_then(|result| result);

            match snapshot {
                Ok(snapshot) => {
                    return WindowUsage {
                        used: snapshot.map_or(0, |snapshot| snapshot.count),
                        limit: policy.limit(),
                        reset_time: snapshot.map(|snapshot| now + snapshot.reset_after()),
                    };
                }
                Err(e) => {
                    warn!(
                        identity = %identity,
                        backend = store.backend_name(),
                        error = %e,
                        "Shared rate limit store failed, reading local counters"
                    );
                }
            }
        }

        let local = self.fallback.peek(identity, policy.window_seconds()).await;
        WindowUsage {
            used: local.map_or(0, |(count, _)| count),
            limit: policy.limit(),
            reset_time: local.map(|(_, reset_at)| reset_at),
        }
    }

    /// Clear counters for `identity` in both the shared store and the fallback
    pub async fn reset(
        &self,
        identity: &IdentityKey,
        window_seconds: u64,
    ) -> Result<(), CounterStoreError> {
        self.fallback.clear(identity, window_seconds).await;

        if let Some(store) = &self.primary {
            let key = identity.to_store_key(&self.config.key_prefix, window_seconds);
            tokio::time::timeout(self.store_timeout(), store.clear(&key))
                .await
                .map_err(|_| CounterStoreError::Timeout(self.config.store_timeout_ms))??;
        }

        debug!(identity = %identity, window_seconds, "Rate limit counters reset");
        Ok(())
    }

    /// Start the periodic sweep of expired counters in both stores
    pub fn start_cleanup_task(self: Arc<Self>) -> JoinHandle<()> {
        let cleanup_interval =
            Duration::from_secs(self.config.local_fallback.cleanup_interval_seconds.max(1));

        tokio::spawn(async move {
            let mut interval = interval(cleanup_interval);

            loop {
                interval.tick().await;
                let removed_local = self.fallback.cleanup().await;
                let removed_shared = match &self.primary {
                    Some(store) => store.cleanup().await,
                    None => 0,
                };
                debug!(removed_local, removed_shared, "Rate limiter cleanup completed");
            }
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Current time as seen by the counters
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn hit_shared(
        &self,
        store: &dyn CounterStore,
        identity: &IdentityKey,
        policy: &RateLimitPolicy,
    ) -> Result<CounterHit, CounterStoreError> {
        let key = identity.to_store_key(&self.config.key_prefix, policy.window_seconds());
        let hit = store.hit(&key, policy.window_seconds(), u64::from(policy.ceiling()));

        tokio::time::timeout(self.store_timeout(), hit)
            .await
            .map_err(|_| CounterStoreError::Timeout(self.config.store_timeout_ms))?
    }

    fn decide(hit: CounterHit, policy: &RateLimitPolicy, now: DateTime<Utc>) -> RateLimitDecision {
        RateLimitDecision::for_window(
            policy,
            hit.count_before,
            now + hit.reset_after(),
            hit.incremented,
            false,
        )
    }

    fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.config.store_timeout_ms)
    }
}
