//! PHI field encryption. Transparent AES-256-GCM encrypt/decrypt of clinical
//! free-text fields at the persistence boundary, with versioned keys fetched
//! from an external secret store.

pub mod backup;
pub mod codec;
pub mod keystore;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
pub use codec::{decrypt_field, encrypt_field};
pub use keystore::SecretStore;

/// A single 32-byte AES-256 data-encryption key, tagged with the version it
/// was issued under.
#[derive(Clone)]
pub struct EncryptionKey {
    pub version: String,
    pub bytes: [u8; 32],
}

/// Per-process cache of encryption keys, populated lazily from a
/// [`SecretStore`] and kept for the process lifetime.
///
/// `Clone` is shallow: each clone starts from the same `store` handle but
/// keeps its own cache, so the several repositories that each own a
/// `KeyRing` by value populate their caches independently rather than
/// sharing one map. Acceptable because `fetch_key` is already idempotent and
/// cheap to repeat; see `bin/server.rs` where one `KeyRing` is cloned per
/// repository at startup.
pub struct KeyRing {
    store: Arc<dyn SecretStore>,
    active_version: String,
    cache: RwLock<HashMap<String, EncryptionKey>>,
}

/// Hand-written because `parking_lot::RwLock` isn't `Clone`: a derived impl
/// would need to clone the lock itself rather than just what's behind it.
/// Each clone gets a fresh, empty cache, matching the struct doc above.
impl Clone for KeyRing {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), active_version: self.active_version.clone(), cache: RwLock::new(HashMap::new()) }
    }
}

impl KeyRing {
    pub fn new(store: Arc<dyn SecretStore>, active_version: impl Into<String>) -> Self {
        Self { store, active_version: active_version.into(), cache: RwLock::new(HashMap::new()) }
    }

    pub fn active_version(&self) -> &str {
        &self.active_version
    }

    /// Fetches and caches a key by version, failing closed with
    /// `UnknownKeyVersion` if the secret store has no matching key rather
    /// than silently falling back to a different version.
    pub async fn key_for_version(&self, version: &str) -> Result<EncryptionKey> {
        if let Some(key) = self.cache.read().get(version).cloned() {
            return Ok(key);
        }

        let bytes = self
            .store
            .fetch_key(version)
            .await
            .ok_or_else(|| Error::unknown_key_version(version))?;
        let key = EncryptionKey { version: version.to_string(), bytes };
        self.cache.write().insert(version.to_string(), key.clone());
        Ok(key)
    }

    pub async fn active_key(&self) -> Result<EncryptionKey> {
        let version = self.active_version.clone();
        self.key_for_version(&version).await
    }
}
