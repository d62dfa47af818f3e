//! In-process fallback counters
//!
//! Used only when the shared counter store cannot answer. Counters here are
//! not shared between processes, so degraded-mode limits are per instance.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::clock::Clock;
use super::storage::window_duration;
use super::types::{IdentityKey, MultiWindowDecision, RateLimitDecision, RateLimitPolicy};
use crate::config::LocalFallbackConfig;

#[derive(Debug, Clone, Copy)]
struct FallbackEntry {
    count: u64,
    reset_at: DateTime<Utc>,
}

/// Bounded map of `identity:window` to counters with an explicit reset time
pub struct LocalFallbackCache {
    entries: Mutex<HashMap<String, FallbackEntry>>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl LocalFallbackCache {
    pub fn new(config: &LocalFallbackConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: config.max_entries.max(1),
            clock,
        }
    }

    /// Decide and count one request in degraded mode
    pub async fn check(
        &self,
        identity: &IdentityKey,
        policy: &RateLimitPolicy,
    ) -> RateLimitDecision {
        let now = self.clock.now();
        let key = identity.to_local_key(policy.window_seconds());

        let mut entries = self.entries.lock().await;
        let (count, reset_at) = Self::current(&entries, &key, policy, now);
        let admitted = count < u64::from(policy.ceiling());

        if admitted {
            self.record(&mut entries, key, count + 1, reset_at, now);
        }

        RateLimitDecision::for_window(policy, count, reset_at, admitted, true)
    }

    /// Degraded-mode form of a multi-window check: counted in every window
    /// or in none
    pub async fn check_all(
        &self,
        identity: &IdentityKey,
        policies: &[RateLimitPolicy],
    ) -> MultiWindowDecision {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;

        let observed: Vec<(String, u64, DateTime<Utc>)> = policies
            .iter()
            .map(|policy| {
                let key = identity.to_local_key(policy.window_seconds());
                let (count, reset_at) = Self::current(&entries, &key, policy, now);
                (key, count, reset_at)
            })
            .collect();

        let admitted = policies
            .iter()
            .zip(&observed)
            .all(|(policy, (_, count, _))| *count < u64::from(policy.ceiling()));

        let mut windows = Vec::with_capacity(policies.len());
        for (policy, (key, count, reset_at)) in policies.iter().zip(observed) {
            if admitted {
                self.record(&mut entries, key, count + 1, reset_at, now);
            }
            windows.push(RateLimitDecision::for_window(
                policy, count, reset_at, admitted, true,
            ));
        }

        MultiWindowDecision::from_windows(windows)
    }

    /// Count and reset time of an open window, without counting a request
    pub async fn peek(
        &self,
        identity: &IdentityKey,
        window_seconds: u64,
    ) -> Option<(u64, DateTime<Utc>)> {
        let now = self.clock.now();
        self.entries
            .lock()
            .await
            .get(&identity.to_local_key(window_seconds))
            .filter(|entry| now < entry.reset_at)
            .map(|entry| (entry.count, entry.reset_at))
    }

    /// Forget the counter for one identity and window
    pub async fn clear(&self, identity: &IdentityKey, window_seconds: u64) {
        self.entries
            .lock()
            .await
            .remove(&identity.to_local_key(window_seconds));
    }

    /// Drop every entry whose window has ended
    pub async fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.reset_at);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Swept local fallback counters");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    fn current(
        entries: &HashMap<String, FallbackEntry>,
        key: &str,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> (u64, DateTime<Utc>) {
        match entries.get(key).filter(|entry| now < entry.reset_at) {
            Some(entry) => (entry.count, entry.reset_at),
            None => (0, now + window_duration(policy.window_seconds())),
        }
    }

    fn record(
        &self,
        entries: &mut HashMap<String, FallbackEntry>,
        key: String,
        count: u64,
        reset_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            Self::make_room(entries, self.max_entries, now);
        }
        entries.insert(key, FallbackEntry { count, reset_at });
    }

    fn make_room(
        entries: &mut HashMap<String, FallbackEntry>,
        max_entries: usize,
        now: DateTime<Utc>,
    ) {
        entries.retain(|_, entry| now < entry.reset_at);

        while entries.len() >= max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.reset_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                    debug!("Evicted local fallback counter to stay within bound");
                }
                None => break,
            }
        }
    }
}
