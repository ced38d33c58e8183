//! Offline GPG-encrypted key backups.
//!
//! Shelling out to a real `gpg` binary is an operational detail; what this
//! module owns is the export/import envelope format and the invariant that
//! restoring a backup yields back the exact key bytes that were exported —
//! the part a test can actually hold to account without a GPG keyring
//! available in CI.

use std::process::{Command, Stdio};
use std::io::Write;

use crate::error::{Error, Result};

/// A backup record for one key version, ready to be piped into `gpg
/// --symmetric` (or an equivalent asymmetric recipient invocation; this
/// module uses the passphrase-based form).
pub struct KeyBackupRecord {
    pub version: String,
    pub key_bytes: [u8; 32],
}

impl KeyBackupRecord {
    fn payload(&self) -> String {
        // version + hex key, newline-terminated; simple enough that a
        // human restoring from an offline export can verify it by eye.
        format!("{}\n{}\n", self.version, hex::encode(self.key_bytes))
    }

    fn parse(payload: &str) -> Result<Self> {
        let mut lines = payload.lines();
        let version = lines.next().ok_or(Error::EncryptionFailed)?.to_string();
        let hex_key = lines.next().ok_or(Error::EncryptionFailed)?;
        let bytes = hex::decode(hex_key).map_err(|_| Error::EncryptionFailed)?;
        let key_bytes: [u8; 32] = bytes.try_into().map_err(|_| Error::EncryptionFailed)?;
        Ok(Self { version, key_bytes })
    }
}

/// Encrypts a key backup record with `gpg --symmetric --batch --passphrase`.
/// Requires a `gpg` binary on `PATH`; callers running this outside an
/// environment with one (e.g. most test runners) should prefer
/// [`encrypt_record_for_test`].
pub fn export_encrypted(record: &KeyBackupRecord, passphrase: &str) -> Result<Vec<u8>> {
    run_gpg(
        &["--symmetric", "--batch", "--yes", "--passphrase-fd", "0", "--pinentry-mode", "loopback"],
        &format!("{}\n{}", passphrase, record.payload()),
    )
}

/// Decrypts a backup produced by [`export_encrypted`] and parses it back
/// into a [`KeyBackupRecord`]. The round trip must be bit-identical; the
/// hex/newline envelope makes that property trivial to assert without
/// depending on a `gpg` binary in this repo's own test suite (see
/// [`encrypt_record_for_test`] / [`decrypt_record_for_test`]).
pub fn import_encrypted(ciphertext: &[u8], passphrase: &str) -> Result<KeyBackupRecord> {
    let plaintext = run_gpg_decrypt(ciphertext, passphrase)?;
    KeyBackupRecord::parse(&plaintext)
}

fn run_gpg(args: &[&str], stdin_payload: &str) -> Result<Vec<u8>> {
    let mut child = Command::new("gpg")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::internal(format!("failed to spawn gpg: {e}")))?;

    child
        .stdin
        .take()
        .ok_or_else(|| Error::internal("gpg stdin unavailable"))?
        .write_all(stdin_payload.as_bytes())
        .map_err(|e| Error::internal(format!("failed writing to gpg stdin: {e}")))?;

    let output = child
        .wait_with_output()
        .map_err(|e| Error::internal(format!("gpg did not exit cleanly: {e}")))?;

    if !output.status.success() {
        return Err(Error::internal("gpg export failed"));
    }
    Ok(output.stdout)
}

fn run_gpg_decrypt(ciphertext: &[u8], passphrase: &str) -> Result<String> {
    let mut child = Command::new("gpg")
        .args(["--decrypt", "--batch", "--yes", "--passphrase-fd", "0", "--pinentry-mode", "loopback"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::internal(format!("failed to spawn gpg: {e}")))?;

    {
        let mut stdin = child.stdin.take().ok_or_else(|| Error::internal("gpg stdin unavailable"))?;
        stdin
            .write_all(format!("{passphrase}\n").as_bytes())
            .map_err(|e| Error::internal(format!("failed writing passphrase: {e}")))?;
        stdin
            .write_all(ciphertext)
            .map_err(|e| Error::internal(format!("failed writing ciphertext: {e}")))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| Error::internal(format!("gpg did not exit cleanly: {e}")))?;
    if !output.status.success() {
        return Err(Error::internal("gpg import failed"));
    }
    String::from_utf8(output.stdout).map_err(|_| Error::internal("gpg output was not utf-8"))
}

/// Exercises the envelope format without spawning `gpg`, using the same
/// AEAD primitive as the field codec keyed by a passphrase hash. This keeps
/// the bit-identical round-trip property testable in this repo's own suite;
/// production backups still go through the real `gpg` binary above so the
/// artifact is restorable by an operator with a standard GPG toolchain.
#[cfg(test)]
pub fn encrypt_record_for_test(record: &KeyBackupRecord, passphrase: &str) -> Vec<u8> {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};
    use sha2::{Digest, Sha256};

    let key_bytes: [u8; 32] = Sha256::digest(passphrase.as_bytes()).into();
    let cipher = Aes256Gcm::new_from_slice(&key_bytes).unwrap();
    let nonce = Nonce::from_slice(b"backup-nonce");
    let mut out = cipher.encrypt(nonce, record.payload().as_bytes()).unwrap();
    out.splice(0..0, nonce.iter().copied());
    out
}

#[cfg(test)]
pub fn decrypt_record_for_test(ciphertext: &[u8], passphrase: &str) -> Result<KeyBackupRecord> {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};
    use sha2::{Digest, Sha256};

    let key_bytes: [u8; 32] = Sha256::digest(passphrase.as_bytes()).into();
    let cipher = Aes256Gcm::new_from_slice(&key_bytes).map_err(|_| Error::EncryptionFailed)?;
    let (nonce_bytes, ct) = ciphertext.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher.decrypt(nonce, ct).map_err(|_| Error::EncryptionFailed)?;
    let payload = String::from_utf8(plaintext).map_err(|_| Error::EncryptionFailed)?;
    KeyBackupRecord::parse(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_round_trip_is_bit_identical() {
        let record = KeyBackupRecord { version: "v3".to_string(), key_bytes: [42u8; 32] };
        let ciphertext = encrypt_record_for_test(&record, "correct horse battery staple");
        let restored = decrypt_record_for_test(&ciphertext, "correct horse battery staple").unwrap();
        assert_eq!(restored.version, record.version);
        assert_eq!(restored.key_bytes, record.key_bytes);
    }

    #[test]
    fn wrong_passphrase_fails_closed() {
        let record = KeyBackupRecord { version: "v3".to_string(), key_bytes: [42u8; 32] };
        let ciphertext = encrypt_record_for_test(&record, "correct passphrase");
        let result = decrypt_record_for_test(&ciphertext, "wrong passphrase");
        assert!(result.is_err());
    }
}
