//! In-process `FastStore`, used by tests and as the single-process dev-mode
//! backing. Mirrors Redis semantics closely enough (expiry, sliding-window
//! eviction) that tests against it exercise the same contracts the Redis
//! implementation does.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::kv::FastStore;

struct Entry {
    value: String,
    expires_at_millis: i64,
}

struct WindowEntry {
    timestamps_millis: Vec<i64>,
    expires_at_millis: i64,
}

#[derive(Default)]
pub struct InMemoryFastStore {
    entries: Mutex<HashMap<String, Entry>>,
    windows: Mutex<HashMap<String, WindowEntry>>,
    counters: Mutex<HashMap<String, (u64, i64)>>,
}

impl InMemoryFastStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now_millis() -> i64 {
    (crate::time_util::now().unix_timestamp_nanos() / 1_000_000) as i64
}

#[async_trait]
impl FastStore for InMemoryFastStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry { value: value.to_string(), expires_at_millis: now_millis() + (ttl_secs as i64) * 1000 },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        let now = now_millis();
        if let Some(entry) = entries.get(key) {
            if entry.expires_at_millis <= now {
                entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn set_if_absent_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap();
        let now = now_millis();
        if let Some(entry) = entries.get(key) {
            if entry.expires_at_millis > now {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry { value: value.to_string(), expires_at_millis: now + (ttl_secs as i64) * 1000 },
        );
        Ok(true)
    }

    async fn record_and_count(&self, key: &str, now_millis_arg: i64, window_secs: u64) -> Result<u64> {
        let mut windows = self.windows.lock().unwrap();
        let window_millis = (window_secs as i64) * 1000;
        let entry = windows.entry(key.to_string()).or_insert_with(|| WindowEntry {
            timestamps_millis: Vec::new(),
            expires_at_millis: now_millis_arg + window_millis,
        });
        entry.timestamps_millis.push(now_millis_arg);
        entry.timestamps_millis.retain(|t| *t > now_millis_arg - window_millis);
        entry.expires_at_millis = now_millis_arg + window_millis;
        Ok(entry.timestamps_millis.len() as u64)
    }

    async fn incr_ex(&self, key: &str, ttl_secs: u64) -> Result<u64> {
        let mut counters = self.counters.lock().unwrap();
        let now = now_millis();
        let entry = counters.entry(key.to_string()).or_insert((0, now + (ttl_secs as i64) * 1000));
        if entry.1 <= now {
            *entry = (0, now + (ttl_secs as i64) * 1000);
        }
        entry.0 += 1;
        Ok(entry.0)
    }
}
