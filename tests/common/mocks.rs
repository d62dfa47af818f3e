//! Counter store doubles for exercising the degraded path

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use community_core::infrastructure::rate_limiter::{
    CounterHit, CounterSnapshot, CounterStore, CounterStoreError, InMemoryCounterStore,
    WindowCounter,
};

/// Store that fails every call, as if the network were down
#[derive(Default)]
pub struct UnreachableCounterStore {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CounterStore for UnreachableCounterStore {
    async fn hit_all(
        &self,
        _counters: &[WindowCounter],
    ) -> Result<Vec<CounterHit>, CounterStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CounterStoreError::Unavailable("connection refused".to_string()))
    }

    async fn peek(&self, _key: &str) -> Result<Option<CounterSnapshot>, CounterStoreError> {
        Err(CounterStoreError::Unavailable("connection refused".to_string()))
    }

    async fn clear(&self, _key: &str) -> Result<(), CounterStoreError> {
        Err(CounterStoreError::Unavailable("connection refused".to_string()))
    }

    async fn cleanup(&self) -> usize {
        0
    }

    fn backend_name(&self) -> &'static str {
        "unreachable"
    }
}

/// In-memory store that can be switched off mid-test
pub struct FlakyCounterStore {
    inner: InMemoryCounterStore,
    down: AtomicBool,
}

impl FlakyCounterStore {
    pub fn new(inner: InMemoryCounterStore) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
        }
    }

    pub fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    pub fn come_back(&self) {
        self.down.store(false, Ordering::SeqCst);
    }

    fn check_up(&self) -> Result<(), CounterStoreError> {
        if self.down.load(Ordering::SeqCst) {
            Err(CounterStoreError::Unavailable("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CounterStore for FlakyCounterStore {
    async fn hit_all(
        &self,
        counters: &[WindowCounter],
    ) -> Result<Vec<CounterHit>, CounterStoreError> {
        self.check_up()?;
        self.inner.hit_all(counters).await
    }

    async fn peek(&self, key: &str) -> Result<Option<CounterSnapshot>, CounterStoreError> {
        self.check_up()?;
        self.inner.peek(key).await
    }

    async fn clear(&self, key: &str) -> Result<(), CounterStoreError> {
        self.check_up()?;
        self.inner.clear(key).await
    }

    async fn cleanup(&self) -> usize {
        self.inner.cleanup().await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// Store that answers only after a delay
pub struct SlowCounterStore {
    pub delay: Duration,
}

#[async_trait]
impl CounterStore for SlowCounterStore {
    async fn hit_all(
        &self,
        counters: &[WindowCounter],
    ) -> Result<Vec<CounterHit>, CounterStoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(counters
            .iter()
            .map(|counter| CounterHit {
                count_before: 0,
                ttl_millis: counter.window_seconds * 1000,
                incremented: true,
            })
            .collect())
    }

    async fn peek(&self, _key: &str) -> Result<Option<CounterSnapshot>, CounterStoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn clear(&self, _key: &str) -> Result<(), CounterStoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn cleanup(&self) -> usize {
        0
    }

    fn backend_name(&self) -> &'static str {
        "slow"
    }
}

pub fn unreachable_store() -> Arc<UnreachableCounterStore> {
    Arc::new(UnreachableCounterStore::default())
}
