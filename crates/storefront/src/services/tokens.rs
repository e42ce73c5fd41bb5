//! Access and refresh token lifecycle.
//!
//! Access tokens are short-lived HS256 JWTs validated by signature and expiry
//! alone. Refresh tokens are long-lived JWTs signed with a different secret;
//! the only refresh token that can mint new access tokens for a user is the
//! one stored under `refresh_token:<userId>` in the session cache. Issuing a
//! new pair overwrites that entry, which invalidates the previous refresh
//! token.
//!
//! The issuer holds no per-user state itself, so any number of replicas that
//! share the cache behave the same.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use mercato_core::UserId;

use crate::cache::{CacheError, KeyValueCache};
use crate::config::TokenSecrets;

/// Access token lifetime.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Refresh token lifetime, also the TTL of its cache entry.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Errors from issuing or checking tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, malformed token, or wrong token kind.
    #[error("invalid token")]
    Invalid,

    /// Signature is valid but the token is past its expiry.
    #[error("token expired")]
    Expired,

    /// Refresh token is valid but no longer the current one for its user.
    #[error("token revoked")]
    Revoked,

    /// Signing failed.
    #[error("failed to sign token: {0}")]
    Signing(String),

    /// The session cache could not be read or written.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: UserId,
    iat: i64,
    exp: i64,
    /// Random id so two tokens minted in the same second differ.
    jti: Uuid,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }
}

/// Issues, validates, rotates and revokes tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    inner: Arc<TokenIssuerInner>,
}

struct TokenIssuerInner {
    access: SigningKeys,
    refresh: SigningKeys,
    cache: KeyValueCache,
}

fn refresh_key(user_id: UserId) -> String {
    format!("refresh_token:{user_id}")
}

fn validation(check_expiry: bool) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = check_expiry;
    if !check_expiry {
        validation.required_spec_claims.clear();
    }
    validation
}

fn classify(err: &jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    }
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secrets: &TokenSecrets, cache: KeyValueCache) -> Self {
        Self {
            inner: Arc::new(TokenIssuerInner {
                access: SigningKeys::from_secret(&secrets.access),
                refresh: SigningKeys::from_secret(&secrets.refresh),
                cache,
            }),
        }
    }

    /// Issue a new pair and make its refresh token the user's only valid one.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` or `TokenError::Cache` on infrastructure
    /// failure; no refresh token is recorded in that case.
    #[tracing::instrument(skip(self))]
    pub async fn issue_token_pair(&self, user_id: UserId) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        let access = sign(&self.inner.access, user_id, now, ACCESS_TOKEN_TTL)?;
        let refresh = sign(&self.inner.refresh, user_id, now, REFRESH_TOKEN_TTL)?;

        self.inner
            .cache
            .set(&refresh_key(user_id), &refresh, Some(REFRESH_TOKEN_TTL))
            .await?;

        tracing::debug!("issued token pair");
        Ok(TokenPair { access, refresh })
    }

    /// Check an access token's signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` for an expired token and
    /// `TokenError::Invalid` for anything else that fails to verify.
    pub fn validate_access(&self, token: &str) -> Result<UserId, TokenError> {
        decode::<Claims>(token, &self.inner.access.decoding, &validation(true))
            .map(|data| data.claims.user_id)
            .map_err(|e| classify(&e))
    }

    /// Exchange the current refresh token for a new access token.
    ///
    /// The refresh token itself is not rotated.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` or `Expired` when the token does not verify, and
    /// `Revoked` when it is not the value currently stored for its user.
    #[tracing::instrument(skip_all)]
    pub async fn rotate_access(&self, refresh: &str) -> Result<String, TokenError> {
        let claims = decode::<Claims>(refresh, &self.inner.refresh.decoding, &validation(true))
            .map_err(|e| classify(&e))?
            .claims;

        let stored = self.inner.cache.get(&refresh_key(claims.user_id)).await?;
        if stored.as_deref() != Some(refresh) {
            tracing::info!(user_id = %claims.user_id, "rejected superseded refresh token");
            return Err(TokenError::Revoked);
        }

        sign(&self.inner.access, claims.user_id, Utc::now(), ACCESS_TOKEN_TTL)
    }

    /// Forget the user's refresh token. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Cache` if the cache delete fails.
    pub async fn revoke(&self, user_id: UserId) -> Result<(), TokenError> {
        self.inner.cache.delete(&refresh_key(user_id)).await?;
        Ok(())
    }

    /// Revoke whoever owns a presented refresh token, expired or not.
    ///
    /// Returns the owner, or `None` when the token cannot be attributed to a
    /// user (bad signature, garbage), in which case nothing happens.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Cache` if the cache delete fails.
    pub async fn revoke_presented(&self, refresh: &str) -> Result<Option<UserId>, TokenError> {
        let Ok(data) = decode::<Claims>(refresh, &self.inner.refresh.decoding, &validation(false))
        else {
            return Ok(None);
        };
        self.revoke(data.claims.user_id).await?;
        Ok(Some(data.claims.user_id))
    }
}

fn sign(
    keys: &SigningKeys,
    user_id: UserId,
    issued_at: DateTime<Utc>,
    ttl: Duration,
) -> Result<String, TokenError> {
    let lifetime = i64::try_from(ttl.as_secs()).map_err(|e| TokenError::Signing(e.to_string()))?;
    let iat = issued_at.timestamp();
    let claims = Claims {
        user_id,
        iat,
        exp: iat + lifetime,
        jti: Uuid::new_v4(),
    };

    encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
        .map_err(|e| TokenError::Signing(e.to_string()))
}
