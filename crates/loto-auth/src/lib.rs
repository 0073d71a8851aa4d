//! Bearer-token verification against the identity provider's published key set.
//!
//! # Key-set cache
//! [`JwksVerifier`] fetches `{domain}/.well-known/jwks.json` on the first
//! verification and keeps it for the life of the process. There is **no
//! refresh**: if the provider rotates its signing keys, tokens signed with the
//! new key fail with [`AuthError::NoMatchingKey`] until the daemon restarts.
//! A failed fetch is not cached; the next request retries.

pub mod claims;

use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{
    decode, decode_header, errors::ErrorKind, jwk::JwkSet, Algorithm, DecodingKey, Validation,
};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use loto_config::AuthConfig;

pub use claims::{Capability, Claims, OneOrMany};

// ---------------------------------------------------------------------------
// AuthError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or invalid Authorization header")]
    MissingBearer,
    #[error("invalid token header")]
    InvalidHeader,
    #[error("invalid header: no matching key")]
    NoMatchingKey,
    #[error("token expired")]
    Expired,
    #[error("invalid claims: {0}")]
    InvalidClaims(String),
    #[error("invalid audience: expected {expected}, got {got:?}")]
    InvalidAudience { expected: String, got: Vec<String> },
    #[error("token invalid: {0}")]
    InvalidToken(String),
    #[error("insufficient scope, required: {required}")]
    InsufficientScope { required: &'static str },
    #[error("unable to fetch key set: {0}")]
    KeySetUnavailable(String),
}

impl AuthError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InsufficientScope { .. } => "FORBIDDEN",
            AuthError::KeySetUnavailable(_) => "SERVICE_UNAVAILABLE",
            _ => "UNAUTHORIZED",
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingBearer)
}

// ---------------------------------------------------------------------------
// TokenVerifier
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

// ---------------------------------------------------------------------------
// JwksVerifier
// ---------------------------------------------------------------------------

/// RS256 verifier backed by the provider's JWKS endpoint.
pub struct JwksVerifier {
    jwks_url: String,
    issuer: String,
    audience: String,
    http: reqwest::Client,
    keys: OnceCell<JwkSet>,
}

impl JwksVerifier {
    pub fn new(cfg: &AuthConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.fetch_timeout)
            .connect_timeout(cfg.connect_timeout)
            .build()
            .context("failed to build key-set http client")?;
        Ok(Self {
            jwks_url: cfg.jwks_url(),
            issuer: cfg.issuer(),
            audience: cfg.audience.clone(),
            http,
            keys: OnceCell::new(),
        })
    }

    /// Cached after the first successful fetch.
    async fn key_set(&self) -> Result<&JwkSet, AuthError> {
        self.keys.get_or_try_init(|| self.fetch_key_set()).await
    }

    async fn fetch_key_set(&self) -> Result<JwkSet, AuthError> {
        let resp = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| key_set_error(&self.jwks_url, e))?;

        let set: JwkSet = resp
            .json()
            .await
            .map_err(|e| key_set_error(&self.jwks_url, e))?;

        info!(url = %self.jwks_url, keys = set.keys.len(), "key set fetched and cached");
        Ok(set)
    }
}

fn key_set_error(url: &str, e: reqwest::Error) -> AuthError {
    let detail = if e.is_timeout() {
        "timeout".to_string()
    } else {
        e.to_string()
    };
    warn!(url = %url, error = %detail, "key set fetch failed");
    AuthError::KeySetUnavailable(detail)
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => AuthError::InvalidClaims(e.to_string()),
        _ => AuthError::InvalidToken(e.to_string()),
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::InvalidHeader)?;
        let kid = header.kid.ok_or(AuthError::NoMatchingKey)?;

        let jwks = self.key_set().await?;
        let jwk = jwks.find(&kid).ok_or(AuthError::NoMatchingKey)?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        // Audience is compared below, ignoring trailing slashes.
        validation.validate_aud = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &key, &validation).map_err(map_jwt_error)?;

        if !data.claims.audience_matches(&self.audience) {
            return Err(AuthError::InvalidAudience {
                expected: self.audience.trim_end_matches('/').to_string(),
                got: data.claims.audiences(),
            });
        }
        Ok(data.claims)
    }
}
