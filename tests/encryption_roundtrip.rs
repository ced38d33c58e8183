//! End-to-end check of the PHI field codec through the public crate API:
//! round-trip, fail-closed decryption, and AAD binding, exercised the way a
//! repository actually calls `crypto::{encrypt_field, decrypt_field}` rather
//! than through the codec module's own internal unit tests.

mod common;

use pazpaz::error::Error;
use pazpaz::ids::{ClientId, SessionId, WorkspaceId};

#[tokio::test]
async fn client_field_round_trips_under_its_real_aad() {
    let keyring = common::test_keyring();
    let workspace_id = WorkspaceId::new();
    let client_id = ClientId::new();
    let aad = format!("client:{workspace_id}:{client_id}:medical_history").into_bytes();

    let plaintext = "history of lower back pain, physiotherapy x3/week";
    let ciphertext = pazpaz::crypto::encrypt_field(&keyring, plaintext, &aad).await.unwrap();
    assert!(ciphertext.starts_with("v1:"));

    let decrypted = pazpaz::crypto::decrypt_field(&keyring, &ciphertext, &aad).await.unwrap();
    assert_eq!(decrypted, plaintext);
}

#[tokio::test]
async fn session_field_ciphertext_is_not_portable_across_sessions() {
    let keyring = common::test_keyring();
    let session_a = SessionId::new();
    let session_b = SessionId::new();

    let aad_a = format!("session:{session_a}:subjective").into_bytes();
    let ciphertext = pazpaz::crypto::encrypt_field(&keyring, "patient reports acute pain", &aad_a).await.unwrap();

    // Same ciphertext, wrong session id bound into the AAD: must fail closed
    // rather than decrypt into the wrong patient's record.
    let aad_b = format!("session:{session_b}:subjective").into_bytes();
    let result = pazpaz::crypto::decrypt_field(&keyring, &ciphertext, &aad_b).await;
    assert!(matches!(result, Err(Error::DecryptionFailed)));
}

#[tokio::test]
async fn unknown_key_version_on_stored_ciphertext_fails_closed() {
    let keyring = common::test_keyring();
    let result = pazpaz::crypto::decrypt_field(&keyring, "v7:AAAAAAAAAAAAAAAAAAAAAAAA", &[]).await;
    assert!(matches!(result, Err(Error::UnknownKeyVersion { .. })));
}

#[tokio::test]
async fn truncated_ciphertext_fails_closed_rather_than_panicking() {
    let keyring = common::test_keyring();
    // Shorter than the 12-byte nonce once base64-decoded.
    let result = pazpaz::crypto::decrypt_field(&keyring, "v1:QQ==", &[]).await;
    assert!(matches!(result, Err(Error::DecryptionFailed)));
}
