//! Rate Limiting Infrastructure
//!
//! Fixed-window request limiting per caller identity:
//! - Dragonfly/Redis shared counters, updated atomically per key
//! - In-process fallback counters when the shared store is unreachable
//! - Optional burst caps and named per-endpoint policies
//! - Content creation limits by account tier across several windows

pub mod clock;
pub mod content;
pub mod identity;
pub mod local_fallback;
pub mod service;
pub mod storage;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use content::{ContentLimits, ContentType, ContentWindow, UserTier};
pub use identity::{RequestIdentityResolver, RequestMetadata};
pub use local_fallback::LocalFallbackCache;
pub use service::RateLimiterService;
pub use storage::{CounterStore, DragonflyCounterStore, InMemoryCounterStore};
pub use types::{
    CounterHit, CounterSnapshot, CounterStoreError, DecisionReason, IdentityKey,
    MultiWindowDecision, RateLimitDecision, RateLimitPolicy, WindowCounter, WindowUsage,
};
