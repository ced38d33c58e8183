//! JWT access tokens: short-lived HS256 tokens carrying
//! `(sub=user_id, workspace_id, jti, exp)`, with a fast-store blacklist
//! checked on every verification and failing closed on a store error.

use std::sync::Arc;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ids::{UserId, WorkspaceId};
use crate::kv::FastStore;

const ACCESS_TOKEN_TTL: Duration = Duration::minutes(15);

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    workspace_id: Uuid,
    jti: Uuid,
    exp: i64,
}

pub struct AccessToken {
    pub token: String,
    pub jti: Uuid,
    pub expires_at: time::OffsetDateTime,
}

pub struct JwtIssuer {
    signing_key: Vec<u8>,
    store: Arc<dyn FastStore>,
}

impl JwtIssuer {
    pub fn new(signing_key: Vec<u8>, store: Arc<dyn FastStore>) -> Self {
        Self { signing_key, store }
    }

    pub fn issue(&self, user_id: UserId, workspace_id: WorkspaceId) -> Result<AccessToken> {
        let jti = Uuid::new_v4();
        let expires_at = crate::time_util::now() + ACCESS_TOKEN_TTL;
        let claims = Claims { sub: user_id.0, workspace_id: workspace_id.0, jti, exp: expires_at.unix_timestamp() };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(&self.signing_key))
            .map_err(|error| Error::internal(format!("jwt signing failed: {error}")))?;

        Ok(AccessToken { token, jti, expires_at })
    }

    /// Verifies signature and expiry, then checks the blacklist. A store
    /// error while checking the blacklist is treated as "blacklisted" (fail
    /// closed), matching `is_token_blacklisted`'s posture.
    pub async fn verify(&self, token: &str) -> Result<(UserId, WorkspaceId)> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &DecodingKey::from_secret(&self.signing_key), &validation)
            .map_err(|_| Error::Unauthenticated)?;
        let claims = data.claims;

        let blacklist_key = format!("jwt_blacklist:{}", claims.jti);
        match self.store.get(&blacklist_key).await {
            Ok(Some(_)) => return Err(Error::Unauthenticated),
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(%error, jti = %claims.jti, "jwt blacklist check failed, failing closed");
                return Err(Error::Unauthenticated);
            }
        }

        Ok((UserId(claims.sub), WorkspaceId(claims.workspace_id)))
    }

    /// Blacklists `token`'s jti for the remainder of its lifetime (logout).
    /// A no-op if the token is already expired or malformed.
    pub async fn blacklist(&self, token: &str) -> Result<()> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let data = match decode::<Claims>(token, &DecodingKey::from_secret(&self.signing_key), &validation) {
            Ok(data) => data,
            Err(_) => return Ok(()),
        };

        let remaining = data.claims.exp - crate::time_util::now().unix_timestamp();
        if remaining <= 0 {
            return Ok(());
        }

        let blacklist_key = format!("jwt_blacklist:{}", data.claims.jti);
        self.store.set_ex(&blacklist_key, "1", remaining as u64).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory_store::InMemoryFastStore;

    fn issuer() -> JwtIssuer {
        JwtIssuer::new(b"test-signing-key".to_vec(), Arc::new(InMemoryFastStore::new()))
    }

    #[tokio::test]
    async fn issues_and_verifies_round_trip() {
        let issuer = issuer();
        let user_id = UserId::new();
        let workspace_id = WorkspaceId::new();
        let token = issuer.issue(user_id, workspace_id).unwrap();

        let (verified_user, verified_workspace) = issuer.verify(&token.token).await.unwrap();
        assert_eq!(verified_user, user_id);
        assert_eq!(verified_workspace, workspace_id);
    }

    #[tokio::test]
    async fn blacklisted_token_is_rejected() {
        let issuer = issuer();
        let token = issuer.issue(UserId::new(), WorkspaceId::new()).unwrap();

        issuer.blacklist(&token.token).await.unwrap();
        let result = issuer.verify(&token.token).await;
        assert!(matches!(result, Err(Error::Unauthenticated)));
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let issuer = issuer();
        let token = issuer.issue(UserId::new(), WorkspaceId::new()).unwrap();
        let mut tampered = token.token.clone();
        tampered.push('x');

        let result = issuer.verify(&tampered).await;
        assert!(matches!(result, Err(Error::Unauthenticated)));
    }
}
