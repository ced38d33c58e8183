//! Sliding-window rate limiting over the fast key-value store. A limiter is defined once per call site with its window and max,
//! and checked with a single key (typically `{kind}:{subject}`).

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::kv::FastStore;

#[derive(Debug, Clone, Copy)]
pub struct Limit {
    pub max: u64,
    pub window: Duration,
}

impl Limit {
    pub const fn per_minute(max: u64) -> Self {
        Self { max, window: Duration::from_secs(60) }
    }

    pub const fn per_hour(max: u64) -> Self {
        Self { max, window: Duration::from_secs(3600) }
    }
}

/// Named limits used throughout the service.
pub mod limits {
    use super::Limit;

    pub const MAGIC_LINK_PER_IP: Limit = Limit::per_hour(3);
    pub const SESSION_DRAFT_AUTOSAVE: Limit = Limit::per_minute(60);
    pub const ATTACHMENT_UPLOAD: Limit = Limit::per_minute(10);
}

pub struct RateLimiter {
    store: Arc<dyn FastStore>,
}

/// Whether the caller unavailability of the backing store should fail open
/// (allow the request) or fail closed (deny it). Magic-link issuance is
/// security-critical and must fail closed; most other limiters fail open so
/// a cache outage doesn't take down unrelated functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnStoreError {
    FailOpen,
    FailClosed,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn FastStore>) -> Self {
        Self { store }
    }

    /// Returns `Ok(())` if the action is allowed, `Err(RateLimited)` if the
    /// window is exceeded. `key` should already include the limiter kind and
    /// subject, e.g. `"magic_link:203.0.113.4"`.
    pub async fn check(&self, key: &str, limit: Limit, on_error: OnStoreError) -> Result<()> {
        let now_millis = (crate::time_util::now().unix_timestamp_nanos() / 1_000_000) as i64;
        match self.store.record_and_count(key, now_millis, limit.window.as_secs()).await {
            Ok(count) => {
                if count > limit.max {
                    Err(Error::RateLimited)
                } else {
                    Ok(())
                }
            }
            Err(store_error) => match on_error {
                OnStoreError::FailClosed => {
                    tracing::warn!(error = %store_error, %key, "rate limiter store unavailable, failing closed");
                    Err(Error::RateLimited)
                }
                OnStoreError::FailOpen => Ok(()),
            },
        }
    }

    /// Global brute-force counter. Separate from the sliding window
    /// because this one is a simple saturating counter with its own TTL,
    /// not a windowed rate.
    pub async fn record_failed_attempt(&self, key: &str, threshold: u64, lockout_secs: u64) -> Result<bool> {
        let count = self.store.incr_ex(key, lockout_secs).await?;
        Ok(count >= threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory_store::InMemoryFastStore;

    #[tokio::test]
    async fn allows_up_to_max_then_denies() {
        let limiter = RateLimiter::new(Arc::new(InMemoryFastStore::new()));
        let limit = Limit::per_minute(3);
        for _ in 0..3 {
            limiter.check("k", limit, OnStoreError::FailOpen).await.unwrap();
        }
        let result = limiter.check("k", limit, OnStoreError::FailOpen).await;
        assert!(matches!(result, Err(Error::RateLimited)));
    }

    #[tokio::test]
    async fn brute_force_lockout_triggers_at_threshold() {
        let store = Arc::new(InMemoryFastStore::new());
        let limiter = RateLimiter::new(store);
        let mut locked = false;
        for _ in 0..100 {
            locked = limiter.record_failed_attempt("bf", 100, 300).await.unwrap();
        }
        assert!(locked);
    }
}
