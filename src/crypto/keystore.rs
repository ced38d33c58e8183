//! External secret store abstraction. Production deployments fetch keys from
//! a primary region with automatic failover to named replica regions on
//! transient errors; this module models that contract as a trait so the
//! RTO discipline lives in one tested place instead of being
//! re-implemented at each call site.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the 32-byte key for `version`, or `None` if no such version
    /// exists anywhere in the store's region set.
    async fn fetch_key(&self, version: &str) -> Option<[u8; 32]>;
}

/// An in-process, statically-configured store. Used in tests and as the
/// simplest production backing (keys loaded from `Settings` at startup);
/// region failover is not meaningful for an in-memory map but the trait
/// boundary is what lets a real multi-region client swap in without
/// touching [`crate::crypto::KeyRing`].
pub struct InMemorySecretStore {
    keys: HashMap<String, [u8; 32]>,
}

impl InMemorySecretStore {
    pub fn new(keys: HashMap<String, [u8; 32]>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn fetch_key(&self, version: &str) -> Option<[u8; 32]> {
        self.keys.get(version).copied()
    }
}

/// Wraps a primary [`SecretStore`] with an ordered list of replica stores.
/// `fetch_key` tries the primary first; on a miss (which, for a real remote
/// store, stands in for a transient connectivity error — a store that can
/// distinguish "not configured" from "unreachable" should prefer the latter
/// to trigger failover) it tries each replica in order. A background health
/// prober that demotes an unhealthy primary is out of scope here: the
/// region-failover *policy* is load-bearing, continuous health tracking
/// across restarts is an operational concern for the deployment, not this
/// crate.
pub struct FailoverSecretStore<S> {
    primary: S,
    replicas: Vec<S>,
    failover_count: RwLock<u64>,
}

impl<S: SecretStore> FailoverSecretStore<S> {
    pub fn new(primary: S, replicas: Vec<S>) -> Self {
        Self { primary, replicas, failover_count: RwLock::new(0) }
    }

    /// Number of times a lookup fell through to a replica. Exposed for the
    /// RTO telemetry a real deployment would wire into its dashboards.
    pub fn failover_count(&self) -> u64 {
        *self.failover_count.read()
    }
}

#[async_trait]
impl<S: SecretStore + Sync> SecretStore for FailoverSecretStore<S> {
    async fn fetch_key(&self, version: &str) -> Option<[u8; 32]> {
        if let Some(key) = self.primary.fetch_key(version).await {
            return Some(key);
        }
        for replica in &self.replicas {
            if let Some(key) = replica.fetch_key(version).await {
                *self.failover_count.write() += 1;
                return Some(key);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_replica_on_primary_miss() {
        let mut primary_keys = HashMap::new();
        primary_keys.insert("v1".to_string(), [1u8; 32]);
        let mut replica_keys = HashMap::new();
        replica_keys.insert("v2".to_string(), [2u8; 32]);

        let store = FailoverSecretStore::new(
            InMemorySecretStore::new(primary_keys),
            vec![InMemorySecretStore::new(replica_keys)],
        );

        assert_eq!(store.fetch_key("v1").await, Some([1u8; 32]));
        assert_eq!(store.fetch_key("v2").await, Some([2u8; 32]));
        assert_eq!(store.failover_count(), 1);
        assert_eq!(store.fetch_key("v3").await, None);
    }
}
