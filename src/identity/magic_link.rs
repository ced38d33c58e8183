//! Magic-link issuance and verification: a high-entropy opaque token is
//! stored encrypted in the fast store under `magic_link:{token}` with a
//! short TTL, rate-limited per IP, and single-use. Brute-force detection
//! sits in front of verification as a global failed-attempt counter.

use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::crypto::KeyRing;
use crate::error::{Error, Result};
use crate::ids::{UserId, WorkspaceId};
use crate::kv::FastStore;
use crate::ratelimit::{limits, OnStoreError, RateLimiter};
use crate::users::{User, UserRepository};
use crate::workspace::WorkspaceRepository;

const MAGIC_LINK_TTL_SECS: u64 = 60 * 10;
const BRUTE_FORCE_THRESHOLD: u64 = 100;
const BRUTE_FORCE_LOCKOUT_SECS: u64 = 300;
const BRUTE_FORCE_KEY: &str = "magic_link_failed_attempts";

/// 48 bytes = 384 bits of entropy, comfortably above the bar for a
/// single-use bearer token.
const TOKEN_BYTES: usize = 48;

#[derive(Debug, Serialize, Deserialize)]
struct TokenData {
    user_id: uuid::Uuid,
    workspace_id: uuid::Uuid,
    email: String,
}

/// Outcome of a verification attempt. `TwoFactorRequired` is returned
/// instead of issuing an access token when `User.totp_enabled` is set; full
/// TOTP issuance/verification is out of scope here.
pub enum VerifyOutcome {
    Authenticated { user: User },
    TwoFactorRequired { user_id: UserId },
}

pub struct MagicLinkService {
    store: Arc<dyn FastStore>,
    ring: Arc<KeyRing>,
    limiter: RateLimiter,
    users: UserRepository,
    workspaces: WorkspaceRepository,
}

impl MagicLinkService {
    pub fn new(
        store: Arc<dyn FastStore>,
        ring: Arc<KeyRing>,
        users: UserRepository,
        workspaces: WorkspaceRepository,
    ) -> Self {
        let limiter = RateLimiter::new(store.clone());
        Self { store, ring, limiter, users, workspaces }
    }

    /// Generates and stores a magic-link token for `email`, if a matching
    /// active user exists. Always returns `Ok(())` for an unknown or
    /// inactive email to avoid enumeration; the caller email-sends
    /// best-effort (out of scope here, see `payments::service::PaymentNotifier`
    /// for the equivalent pattern).
    pub async fn request(&self, email: &str, request_ip: &str) -> Result<Option<String>> {
        let rate_limit_key = format!("magic_link:{request_ip}");
        self.limiter.check(&rate_limit_key, limits::MAGIC_LINK_PER_IP, OnStoreError::FailClosed).await?;

        let Some(user) = self.users.find_by_email(email).await? else {
            tracing::info!(%email, "magic link requested for nonexistent email");
            return Ok(None);
        };

        if !user.is_active {
            tracing::warn!(%email, user_id = %user.id, "magic link requested for inactive user");
            return Ok(None);
        }

        let mut token_bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut token_bytes);
        let token = base64_url(&token_bytes);

        let payload =
            TokenData { user_id: user.id.0, workspace_id: user.workspace_id.0, email: user.email.clone() };
        let serialized = serde_json::to_string(&payload).map_err(Error::from)?;
        let encrypted = crate::crypto::encrypt_field(&self.ring, &serialized, b"magic_link").await?;

        self.store.set_ex(&format!("magic_link:{token}"), &encrypted, MAGIC_LINK_TTL_SECS).await?;

        tracing::info!(user_id = %user.id, "magic link generated");
        Ok(Some(token))
    }

    /// Verifies `token`, applying the global brute-force lockout before
    /// doing any lookup work. Deletes the token on every terminal path
    /// (single-use), including failure.
    pub async fn verify(&self, token: &str) -> Result<VerifyOutcome> {
        let failed_attempts: u64 = self.store.get(BRUTE_FORCE_KEY).await?.and_then(|v| v.parse().ok()).unwrap_or(0);
        if failed_attempts >= BRUTE_FORCE_THRESHOLD {
            tracing::error!(failed_attempts, "magic link brute force detected");
            return Err(Error::RateLimited);
        }

        let token_key = format!("magic_link:{token}");
        let stored = self.store.get(&token_key).await?;

        let Some(encrypted) = stored else {
            self.record_failed_attempt().await;
            tracing::warn!("magic link token not found or expired");
            return Err(Error::Unauthenticated);
        };

        let decrypted = match crate::crypto::decrypt_field(&self.ring, &encrypted, b"magic_link").await {
            Ok(decrypted) => decrypted,
            Err(_) => {
                self.record_failed_attempt().await;
                self.store.delete(&token_key).await?;
                return Err(Error::Unauthenticated);
            }
        };
        let token_data: TokenData = match serde_json::from_str(&decrypted) {
            Ok(data) => data,
            Err(_) => {
                self.record_failed_attempt().await;
                self.store.delete(&token_key).await?;
                return Err(Error::Unauthenticated);
            }
        };

        let user = self.users.find(UserId(token_data.user_id)).await?;
        if !user.is_active {
            self.record_failed_attempt().await;
            self.store.delete(&token_key).await?;
            tracing::warn!(user_id = %user.id, "magic link verification failed: user inactive");
            return Err(Error::Unauthenticated);
        }

        let workspace = self.workspaces.find(user.workspace_id).await?;
        if !workspace.status.is_active() {
            self.record_failed_attempt().await;
            self.store.delete(&token_key).await?;
            tracing::warn!(user_id = %user.id, workspace_id = %workspace.id, "magic link verification failed: workspace not active");
            return Err(Error::Unauthenticated);
        }

        self.store.delete(BRUTE_FORCE_KEY).await?;
        self.store.delete(&token_key).await?;

        if user.totp_enabled {
            return Ok(VerifyOutcome::TwoFactorRequired { user_id: user.id });
        }

        Ok(VerifyOutcome::Authenticated { user })
    }

    /// Increments the global failed-attempt counter and resets its TTL on
    /// every failure. Implemented directly over `get`/`set_ex` (rather than
    /// the rate limiter's sliding-window primitive) so a single counter
    /// value is visible to both the pre-check in `verify` and the
    /// increment here.
    async fn record_failed_attempt(&self) {
        let current: u64 = self.store.get(BRUTE_FORCE_KEY).await.ok().flatten().and_then(|v| v.parse().ok()).unwrap_or(0);
        if let Err(error) = self.store.set_ex(BRUTE_FORCE_KEY, &(current + 1).to_string(), BRUTE_FORCE_LOCKOUT_SECS).await {
            tracing::error!(%error, "failed to record magic link brute force attempt");
        }
    }
}

fn base64_url(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD.encode(bytes)
}
