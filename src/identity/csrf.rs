//! CSRF signed double-submit check. A `csrf_token` cookie and an
//! `X-CSRF-Token` header must both be present, match byte-for-byte, and carry
//! a valid HMAC over a per-login nonce under `csrf_signing_key` — a bare
//! matching pair an attacker could mint themselves is not enough, since
//! `Settings::csrf_signing_key` is private to this process. This runs in an
//! Axum middleware layer that sits in front of identity resolution, matching
//! the ordering contract.

use hmac::{Hmac, Mac};
use sha2::Sha256;

const COOKIE_NAME: &str = "csrf_token";
const HEADER_NAME: &str = "x-csrf-token";

/// Mints a token of the form `<nonce-hex>.<hmac-hex>` for the cookie/header
/// pair issued on successful login (`routes::auth::verify_magic_link`), the
/// same `hmac`+`Hmac<Sha256>` pairing `payments::providers::payplus` uses for
/// webhook signatures.
pub fn issue(signing_key: &[u8]) -> String {
    let nonce: [u8; 16] = rand::random();
    let nonce_hex = hex::encode(nonce);
    let mut mac = Hmac::<Sha256>::new_from_slice(signing_key).expect("HMAC accepts any key length");
    mac.update(nonce_hex.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("{nonce_hex}.{signature}")
}

fn signature_valid(signing_key: &[u8], token: &str) -> bool {
    let Some((nonce_hex, signature_hex)) = token.split_once('.') else { return false };
    let Ok(expected) = hex::decode(signature_hex) else { return false };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(signing_key) else { return false };
    mac.update(nonce_hex.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

pub fn extract_cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|pair| {
        let pair = pair.trim();
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Verifies the double-submit pair. Missing either side, a mismatch, or a
/// signature that doesn't verify under `signing_key` all fail; this does not
/// distinguish the reasons in its return value because all three are
/// `Forbidden` to the caller.
pub fn verify(signing_key: &[u8], cookie_header: Option<&str>, header_value: Option<&str>) -> bool {
    let Some(cookie_header) = cookie_header else { return false };
    let Some(cookie_token) = extract_cookie_value(cookie_header, COOKIE_NAME) else { return false };
    let Some(header_token) = header_value else { return false };

    constant_time_eq(cookie_token.as_bytes(), header_token.as_bytes()) && signature_valid(signing_key, cookie_token)
}

/// Compares two byte slices in time independent of where they first differ,
/// same property `hmac::Mac::verify_slice` gives the webhook signature
/// check (`payments::providers::payplus`).
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

pub fn header_name() -> &'static str {
    HEADER_NAME
}

pub fn cookie_name() -> &'static str {
    COOKIE_NAME
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"test-csrf-signing-key";

    #[test]
    fn matching_signed_cookie_and_header_pass() {
        let token = issue(KEY);
        let cookie = format!("csrf_token={token}; other=x");
        assert!(verify(KEY, Some(&cookie), Some(&token)));
    }

    #[test]
    fn mismatched_tokens_fail() {
        let token = issue(KEY);
        let cookie = format!("csrf_token={token}");
        assert!(!verify(KEY, Some(&cookie), Some("different")));
    }

    #[test]
    fn missing_header_fails() {
        let token = issue(KEY);
        let cookie = format!("csrf_token={token}");
        assert!(!verify(KEY, Some(&cookie), None));
    }

    #[test]
    fn missing_cookie_fails() {
        let token = issue(KEY);
        assert!(!verify(KEY, None, Some(&token)));
    }

    #[test]
    fn unsigned_lookalike_token_fails() {
        let cookie = "csrf_token=deadbeef.00112233";
        assert!(!verify(KEY, Some(cookie), Some("deadbeef.00112233")));
    }

    #[test]
    fn token_signed_under_a_different_key_fails() {
        let token = issue(b"other-key");
        let cookie = format!("csrf_token={token}");
        assert!(!verify(KEY, Some(&cookie), Some(&token)));
    }
}
