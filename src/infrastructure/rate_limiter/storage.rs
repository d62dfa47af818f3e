//! Rate Limit Counter Stores
//!
//! Provides the shared, expiring key-counter stores used for rate counting:
//! - Dragonfly/Redis for distributed, production use
//! - In-memory for development and single-instance deployments

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use redis::Script;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::types::{CounterHit, CounterSnapshot, CounterStoreError, WindowCounter};
use crate::config::MAX_WINDOW_SECONDS;

/// Trait for shared counter store backends
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically observe every counter and admit one more request when all
    /// of them are below their ceiling.
    ///
    /// The request is counted in all windows or in none. A key seen for the
    /// first time (or whose expiry is missing) gets an expiry of its window.
    /// Admitting a request on an existing key keeps its expiry. Hits come
    /// back in the order of `counters`.
    async fn hit_all(&self, counters: &[WindowCounter])
        -> Result<Vec<CounterHit>, CounterStoreError>;

    /// Single-window form of [`CounterStore::hit_all`]
    async fn hit(
        &self,
        key: &str,
        window_seconds: u64,
        ceiling: u64,
    ) -> Result<CounterHit, CounterStoreError> {
        let counter = WindowCounter {
            key: key.to_string(),
            window_seconds,
            ceiling,
        };
        self.hit_all(std::slice::from_ref(&counter))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CounterStoreError::Protocol("empty hit reply".to_string()))
    }

    /// Read a counter without counting a request; `None` when no window is open
    async fn peek(&self, key: &str) -> Result<Option<CounterSnapshot>, CounterStoreError>;

    /// Remove a counter
    async fn clear(&self, key: &str) -> Result<(), CounterStoreError>;

    /// Drop expired counters, returning how many were removed
    async fn cleanup(&self) -> usize;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

// KEYS[i] counter key, ARGV[2i-1] window seconds, ARGV[2i] ceiling.
// Returns {admitted, count_before_1, ttl_ms_1, count_before_2, ttl_ms_2, ...}.
const HIT_SCRIPT: &str = r#"
local counts = {}
local ttls = {}
local admitted = 1
for i = 1, #KEYS do
    local window_ms = tonumber(ARGV[2 * i - 1]) * 1000
    local ceiling = tonumber(ARGV[2 * i])
    local count = tonumber(redis.call('GET', KEYS[i]) or '0')
    local ttl = redis.call('PTTL', KEYS[i])
    if ttl == -1 then
        redis.call('PEXPIRE', KEYS[i], window_ms)
        ttl = window_ms
    elseif ttl < 0 then
        ttl = window_ms
    end
    counts[i] = count
    ttls[i] = ttl
    if count >= ceiling then
        admitted = 0
    end
end
local reply = {admitted}
for i = 1, #KEYS do
    if admitted == 1 then
        if counts[i] == 0 then
            redis.call('SET', KEYS[i], 1, 'PX', ttls[i])
        else
            redis.call('INCR', KEYS[i])
        end
    end
    reply[#reply + 1] = counts[i]
    reply[#reply + 1] = ttls[i]
end
return reply
"#;

static HIT: LazyLock<Script> = LazyLock::new(|| Script::new(HIT_SCRIPT));

/// Turn the flat script reply into one hit per counter
fn parse_hit_reply(
    reply: &[i64],
    counters: &[WindowCounter],
) -> Result<Vec<CounterHit>, CounterStoreError> {
    let Some((&admitted, pairs)) = reply.split_first() else {
        return Err(CounterStoreError::Protocol("empty hit reply".to_string()));
    };

    if pairs.len() != counters.len() * 2 {
        return Err(CounterStoreError::Protocol(format!(
            "expected {} values for {} counters, got {}",
            counters.len() * 2,
            counters.len(),
            pairs.len()
        )));
    }

    pairs
        .chunks_exact(2)
        .zip(counters)
        .map(|(pair, counter)| {
            let count_before = u64::try_from(pair[0])
                .map_err(|_| CounterStoreError::Protocol(format!("negative count {}", pair[0])))?;
            Ok(CounterHit {
                count_before,
                ttl_millis: u64::try_from(pair[1])
                    .unwrap_or(counter.window_seconds.saturating_mul(1000)),
                incremented: admitted == 1,
            })
        })
        .collect()
}

/// Dragonfly/Redis counter store
pub struct DragonflyCounterStore {
    connection_manager: Arc<ConnectionManager>,
}

impl DragonflyCounterStore {
    /// Connect to Dragonfly and verify the connection with a PING
    pub async fn new(
        url: &str,
        connection_timeout: std::time::Duration,
    ) -> Result<Self, CounterStoreError> {
        let client = redis::Client::open(url).map_err(|e| {
            warn!("Failed to create Redis client for rate limiting: {}", e);
            CounterStoreError::Unavailable(format!("Failed to create Redis client: {}", e))
        })?;

        let connection_manager =
            tokio::time::timeout(connection_timeout, ConnectionManager::new(client))
                .await
                .map_err(|_| CounterStoreError::Timeout(connection_timeout.as_millis() as u64))?
                .map_err(|e| {
                    warn!(
                        "Failed to create connection manager for rate limiting: {}",
                        e
                    );
                    CounterStoreError::Unavailable(format!(
                        "Failed to create connection manager: {}",
                        e
                    ))
                })?;

        let mut conn = connection_manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| {
                warn!("Failed to ping Redis for rate limiting: {}", e);
                CounterStoreError::Unavailable(format!("Failed to ping Redis: {}", e))
            })?;

        debug!("Successfully connected to Dragonfly for rate limiting");

        Ok(Self {
            connection_manager: Arc::new(connection_manager),
        })
    }
}

#[async_trait]
impl CounterStore for DragonflyCounterStore {
    async fn hit_all(
        &self,
        counters: &[WindowCounter],
    ) -> Result<Vec<CounterHit>, CounterStoreError> {
        let mut conn = (*self.connection_manager).clone();

        let mut invocation = HIT.prepare_invoke();
        for counter in counters {
            invocation
                .key(&counter.key)
                .arg(counter.window_seconds)
                .arg(counter.ceiling);
        }

        let reply: Vec<i64> = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CounterStoreError::Unavailable(format!("Redis EVALSHA error: {}", e)))?;

        parse_hit_reply(&reply, counters)
    }

    async fn peek(&self, key: &str) -> Result<Option<CounterSnapshot>, CounterStoreError> {
        let mut conn = (*self.connection_manager).clone();

        let mut pipe = redis::pipe();
        pipe.cmd("GET").arg(key).cmd("PTTL").arg(key);
        let (count, ttl): (Option<i64>, i64) = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| CounterStoreError::Unavailable(format!("Redis GET error: {}", e)))?;

        let Some(count) = count else {
            return Ok(None);
        };
        let count = u64::try_from(count)
            .map_err(|_| CounterStoreError::Protocol(format!("negative count {}", count)))?;

        Ok(Some(CounterSnapshot {
            count,
            ttl_millis: u64::try_from(ttl).unwrap_or(0),
        }))
    }

    async fn clear(&self, key: &str) -> Result<(), CounterStoreError> {
        let mut conn = (*self.connection_manager).clone();

        redis::cmd("DEL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| CounterStoreError::Unavailable(format!("Redis DEL error: {}", e)))?;

        Ok(())
    }

    async fn cleanup(&self) -> usize {
        // Keys expire on the server
        0
    }

    fn backend_name(&self) -> &'static str {
        "dragonfly"
    }
}

/// Window length as a chrono duration, clamped to the longest accepted window
pub(crate) fn window_duration(window_seconds: u64) -> Duration {
    Duration::seconds(window_seconds.min(MAX_WINDOW_SECONDS) as i64)
}

/// In-memory counter entry with store-managed expiry
#[derive(Debug, Clone, Copy)]
struct MemoryEntry {
    count: u64,
    expires_at: DateTime<Utc>,
}

/// In-memory counter store for development/single instance
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, MemoryEntry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.counters.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.counters.lock().await.is_empty()
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

fn millis_until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((expires_at - now).num_milliseconds()).unwrap_or(0)
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn hit_all(
        &self,
        counters: &[WindowCounter],
    ) -> Result<Vec<CounterHit>, CounterStoreError> {
        let now = self.clock.now();
        let mut entries = self.counters.lock().await;

        let observed: Vec<(u64, DateTime<Utc>)> = counters
            .iter()
            .map(|counter| {
                match entries
                    .get(&counter.key)
                    .filter(|entry| entry.expires_at > now)
                {
                    Some(entry) => (entry.count, entry.expires_at),
                    None => (0, now + window_duration(counter.window_seconds)),
                }
            })
            .collect();

        let admitted = counters
            .iter()
            .zip(&observed)
            .all(|(counter, (count, _))| *count < counter.ceiling);

        let mut hits = Vec::with_capacity(counters.len());
        for (counter, (count_before, expires_at)) in counters.iter().zip(observed) {
            if admitted {
                entries.insert(
                    counter.key.clone(),
                    MemoryEntry {
                        count: count_before + 1,
                        expires_at,
                    },
                );
            }
            hits.push(CounterHit {
                count_before,
                ttl_millis: millis_until(expires_at, now),
                incremented: admitted,
            });
        }

        Ok(hits)
    }

    async fn peek(&self, key: &str) -> Result<Option<CounterSnapshot>, CounterStoreError> {
        let now = self.clock.now();
        let counters = self.counters.lock().await;

        Ok(counters
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| CounterSnapshot {
                count: entry.count,
                ttl_millis: millis_until(entry.expires_at, now),
            }))
    }

    async fn clear(&self, key: &str) -> Result<(), CounterStoreError> {
        self.counters.lock().await.remove(key);
        Ok(())
    }

    async fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut counters = self.counters.lock().await;
        let before = counters.len();
        counters.retain(|_, entry| entry.expires_at > now);
        let removed = before - counters.len();
        debug!(removed, "Completed in-memory counter store cleanup");
        removed
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
