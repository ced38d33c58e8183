//! The fast key-value store shared across the deployment:
//! rate-limit counters, the RAG answer cache, and webhook idempotency keys
//! all live here. A single trait lets the rate limiter, cache, and
//! idempotency check share one Redis connection pool in production and one
//! in-memory map in tests, without either caring which.

pub mod memory_store;
pub mod redis_store;

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait FastStore: Send + Sync {
    /// Sets `key` to `value` with an expiry, unconditionally.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Returns the value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Deletes `key`. A no-op if absent.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Sets `key` to `value` with an expiry only if it does not already
    /// exist, returning whether the set happened. This is the idempotency
    /// primitive the webhook processing step and the magic-link lockout
    /// rely on.
    async fn set_if_absent_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool>;

    /// Appends a timestamp (unix millis) to the sliding window tracked at
    /// `key`, evicts entries older than `window_secs`, and returns the
    /// resulting count — the primitive the sliding-window rate limiter
    /// builds on.
    async fn record_and_count(&self, key: &str, now_millis: i64, window_secs: u64) -> Result<u64>;

    /// Increments a counter at `key` by one, creating it with the given TTL
    /// if absent, and returns the new value. Used by the global brute-force
    /// attempt counter.
    async fn incr_ex(&self, key: &str, ttl_secs: u64) -> Result<u64>;
}
