//! L1 query-result cache. Keyed off a
//! normalized hash of the query text so near-duplicate queries (case,
//! whitespace) share a cache entry; failures never block the request, only
//! degrade it to a cache miss.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ids::{ClientId, WorkspaceId};
use crate::kv::FastStore;
use crate::rag::citation::Citation;

const CACHE_TTL_SECS: u64 = 300;
const CACHE_VERSION: u32 = 1;

/// First 16 hex characters of the SHA-256 of the normalized query text.
/// Used both in the cache key and in the audit metadata (never the raw
/// query text, which may contain PHI).
pub fn query_hash(query: &str) -> String {
    let normalized = query.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(digest)[..16].to_string()
}

pub fn cache_key(workspace_id: WorkspaceId, query: &str, client_id: Option<ClientId>) -> String {
    let hash = query_hash(query);
    match client_id {
        Some(client_id) => format!("ai:query:{workspace_id}:{hash}:{client_id}"),
        None => format!("ai:query:{workspace_id}:{hash}"),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub cache_version: u32,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub language: String,
    pub total_retrieved: usize,
}

impl CachedResponse {
    pub fn new(answer: String, citations: Vec<Citation>, language: String, total_retrieved: usize) -> Self {
        Self { cache_version: CACHE_VERSION, answer, citations, language, total_retrieved }
    }
}

pub struct ResponseCache {
    store: Arc<dyn FastStore>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn FastStore>) -> Self {
        Self { store }
    }

    /// Returns `None` on a cache miss, a malformed entry, or a store error —
    /// all three are treated identically by the caller (fall through to a
    /// live query).
    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let raw = self.store.get(key).await.ok().flatten()?;
        match serde_json::from_str(&raw) {
            Ok(cached) => Some(cached),
            Err(error) => {
                tracing::warn!(%error, %key, "discarding malformed cache entry");
                None
            }
        }
    }

    /// Best-effort write; a failure here only means the next identical
    /// query recomputes instead of hitting cache.
    pub async fn set(&self, key: &str, value: &CachedResponse) {
        let Ok(serialized) = serde_json::to_string(value) else {
            return;
        };
        if let Err(error) = self.store.set_ex(key, &serialized, CACHE_TTL_SECS).await {
            tracing::warn!(%error, %key, "failed to write query cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_case_and_whitespace_insensitive() {
        assert_eq!(query_hash("Back Pain"), query_hash("  back pain  "));
    }

    #[test]
    fn cache_key_includes_client_id_when_scoped() {
        let workspace_id = WorkspaceId::new();
        let client_id = ClientId::new();
        let scoped = cache_key(workspace_id, "pain", Some(client_id));
        let unscoped = cache_key(workspace_id, "pain", None);
        assert!(scoped.starts_with(&unscoped));
        assert!(scoped.ends_with(&client_id.to_string()));
    }

    #[tokio::test]
    async fn round_trips_through_memory_store() {
        use crate::kv::memory_store::InMemoryFastStore;

        let cache = ResponseCache::new(Arc::new(InMemoryFastStore::new()));
        let value = CachedResponse::new("answer".to_string(), vec![], "en".to_string(), 0);
        cache.set("k", &value).await;
        let fetched = cache.get("k").await.unwrap();
        assert_eq!(fetched.answer, "answer");
    }
}
