//! Redis-backed `FastStore`, the production implementation. Uses a
//! `ConnectionManager` so transient connection drops reconnect without the
//! caller having to retry explicitly.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{Error, Result};
use crate::kv::FastStore;

pub struct RedisFastStore {
    conn: ConnectionManager,
}

impl RedisFastStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| Error::Cache(e.to_string()))?;
        let conn = client.get_connection_manager().await.map_err(|e| Error::Cache(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl FastStore for RedisFastStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await.map_err(|e| Error::Cache(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| Error::Cache(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(|e| Error::Cache(e.to_string()))
    }

    async fn set_if_absent_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let opts = redis::SetOptions::default()
            .conditional_set(redis::ExistenceCheck::NX)
            .with_expiration(redis::SetExpiry::EX(ttl_secs));
        let result: Option<String> = conn.set_options(key, value, opts).await.map_err(|e| Error::Cache(e.to_string()))?;
        Ok(result.is_some())
    }

    async fn record_and_count(&self, key: &str, now_millis: i64, window_secs: u64) -> Result<u64> {
        // Sorted set keyed by timestamp; score == member so duplicate
        // millisecond timestamps within a burst don't collapse into one.
        let mut conn = self.conn.clone();
        let window_millis = (window_secs as i64) * 1000;
        let cutoff = now_millis - window_millis;

        let _: () = redis::pipe()
            .atomic()
            .zrembyscore(key, i64::MIN, cutoff)
            .zadd(key, now_millis, now_millis)
            .expire(key, window_secs as i64)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Cache(e.to_string()))?;

        let count: u64 = conn.zcard(key).await.map_err(|e| Error::Cache(e.to_string()))?;
        Ok(count)
    }

    async fn incr_ex(&self, key: &str, ttl_secs: u64) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.incr(key, 1).await.map_err(|e| Error::Cache(e.to_string()))?;
        if count == 1 {
            let _: () = conn.expire(key, ttl_secs as i64).await.map_err(|e| Error::Cache(e.to_string()))?;
        }
        Ok(count)
    }
}
