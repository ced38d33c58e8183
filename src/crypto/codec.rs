//! Ciphertext layout on disk: `version_tag || 12-byte nonce ||
//! ciphertext || 16-byte auth tag`, rendered as `"v1:"` + base64 of the
//! nonce+ciphertext+tag blob so the result is a plain ASCII string a text
//! database column can hold unchanged.
//!
//! Decryption fails closed: a bad tag, a malformed prefix, or an unknown key
//! version all return a typed error. There is no fallback to plaintext and
//! no fallback to a different key version.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

use crate::crypto::KeyRing;
use crate::error::{Error, Result};

const NONCE_LEN: usize = 12;

/// Encrypts `plaintext` under the key ring's active version, producing the
/// `"vN:<base64>"` string stored in the PHI column. `aad` binds the
/// ciphertext to context that must not silently change (e.g. the entity id
/// and field name), giving per-column binding without requiring per-field
/// keys.
pub async fn encrypt_field(ring: &KeyRing, plaintext: &str, aad: &[u8]) -> Result<String> {
    let key = ring.active_key().await?;
    let cipher = Aes256Gcm::new_from_slice(&key.bytes).map_err(|_| Error::EncryptionFailed)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext.as_bytes(), aad })
        .map_err(|_| Error::EncryptionFailed)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);

    Ok(format!("{}:{}", key.version, STANDARD.encode(blob)))
}

/// Decrypts a `"vN:<base64>"` string, selecting the key by the embedded
/// version tag. Fails closed (`DecryptionFailed`, `UnknownKeyVersion`) on any
/// malformed input or tag-verification failure.
pub async fn decrypt_field(ring: &KeyRing, stored: &str, aad: &[u8]) -> Result<String> {
    let (version, b64) = stored.split_once(':').ok_or(Error::DecryptionFailed)?;
    let key = ring.key_for_version(version).await?;

    let blob = STANDARD.decode(b64).map_err(|_| Error::DecryptionFailed)?;
    if blob.len() < NONCE_LEN {
        return Err(Error::DecryptionFailed);
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key.bytes).map_err(|_| Error::DecryptionFailed)?;
    let plaintext = cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| Error::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| Error::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::crypto::keystore::InMemorySecretStore;

    fn ring() -> KeyRing {
        let mut keys = HashMap::new();
        keys.insert("v1".to_string(), [7u8; 32]);
        keys.insert("v2".to_string(), [9u8; 32]);
        let store = Arc::new(InMemorySecretStore::new(keys));
        KeyRing::new(store, "v2")
    }

    #[tokio::test]
    async fn round_trips_utf8_including_hebrew() {
        let ring = ring();
        for text in ["simple note", "כאב גב תחתון", &"x".repeat(5000)] {
            let encrypted = encrypt_field(&ring, text, b"client:field").await.unwrap();
            let decrypted = decrypt_field(&ring, &encrypted, b"client:field").await.unwrap();
            assert_eq!(decrypted, text);
        }
    }

    #[tokio::test]
    async fn old_key_versions_remain_readable() {
        let ring = ring();
        // Force encryption under v1 by constructing the ring with v1 active,
        // then read it back with a ring whose active version is v2.
        let mut keys = HashMap::new();
        keys.insert("v1".to_string(), [7u8; 32]);
        let old_store = Arc::new(InMemorySecretStore::new(keys));
        let old_ring = KeyRing::new(old_store, "v1");

        let encrypted = encrypt_field(&old_ring, "legacy note", b"aad").await.unwrap();
        assert!(encrypted.starts_with("v1:"));

        let new_ring = ring();
        let decrypted = decrypt_field(&new_ring, &encrypted, b"aad").await.unwrap();
        assert_eq!(decrypted, "legacy note");
    }

    #[tokio::test]
    async fn tampered_ciphertext_fails_closed() {
        let ring = ring();
        let mut encrypted = encrypt_field(&ring, "secret", b"aad").await.unwrap();
        encrypted.push('A'); // corrupt the base64 tail
        let result = decrypt_field(&ring, &encrypted, b"aad").await;
        assert!(matches!(result, Err(Error::DecryptionFailed)));
    }

    #[tokio::test]
    async fn unknown_key_version_fails_closed() {
        let ring = ring();
        let result = decrypt_field(&ring, "v99:AAAA", b"aad").await;
        assert!(matches!(result, Err(Error::UnknownKeyVersion { .. })));
    }

    #[tokio::test]
    async fn wrong_aad_fails_closed() {
        let ring = ring();
        let encrypted = encrypt_field(&ring, "secret", b"client:1:notes").await.unwrap();
        let result = decrypt_field(&ring, &encrypted, b"client:2:notes").await;
        assert!(matches!(result, Err(Error::DecryptionFailed)));
    }
}
