//! JWT service for session token issuance and verification
//!
//! Session tokens are HS256-signed JWTs carrying the principal id and role.
//! Verification and decoding are a single step: the only way to obtain an
//! [`Identity`] is through [`JwtService::verify`], so an unverified token can
//! never be projected into claims.

use anyhow::Result;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Role;

/// 30 days
const DEFAULT_TOKEN_LIFETIME: u64 = 2_592_000;

/// Shortest HMAC secret accepted at startup
const MIN_SECRET_LEN: usize = 32;

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC secret for signing and verifying tokens
    pub secret: String,
    /// Token lifetime in seconds (default: 30 days)
    pub token_lifetime: u64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("token_lifetime", &self.token_lifetime)
            .finish()
    }
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: HMAC signing secret, required
    /// - `JWT_TOKEN_LIFETIME`: Token lifetime in seconds (default: 2592000)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;

        let token_lifetime = match std::env::var("JWT_TOKEN_LIFETIME") {
            Ok(value) => value.parse().map_err(|_| {
                anyhow::anyhow!("JWT_TOKEN_LIFETIME must be a number of seconds, got {:?}", value)
            })?,
            Err(_) => DEFAULT_TOKEN_LIFETIME,
        };

        Ok(JwtConfig {
            secret,
            token_lifetime,
        })
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Principal row id
    pub sub: i64,
    /// Principal kind
    pub role: Role,
    /// Unique token id, keeps same-second tokens for one subject distinct
    pub jti: Uuid,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Why a token failed verification or issuance.
///
/// Callers on the request path must not surface the variant to clients.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),

    #[error("token expired")]
    Expired,

    #[error("token timestamp out of range")]
    InvalidTimestamp,

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Verified identity attached to authenticated requests
#[derive(Clone, Serialize)]
pub struct Identity {
    pub subject_id: i64,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip)]
    token: String,
}

impl Identity {
    /// The exact signed string this identity was verified from
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("subject_id", &self.subject_id)
            .field("role", &self.role)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_lifetime: u64,
}

impl JwtService {
    /// Initialize a new JWT service
    ///
    /// Fails when the secret is too short or the lifetime is zero, so a
    /// misconfigured process never starts serving.
    pub fn new(config: JwtConfig) -> Result<Self> {
        if config.secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} bytes long", MIN_SECRET_LEN);
        }
        if config.token_lifetime == 0 {
            anyhow::bail!("JWT_TOKEN_LIFETIME must be greater than zero");
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        // Only HS256 is accepted; expiry is checked in `verify_at` against the
        // caller's clock with no leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(JwtService {
            encoding_key,
            decoding_key,
            validation,
            token_lifetime: config.token_lifetime,
        })
    }

    /// Issue a session token for a principal
    pub fn issue(&self, subject_id: i64, role: Role) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject_id, role, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        subject_id: i64,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let iat = u64::try_from(now.timestamp()).map_err(|_| TokenError::InvalidTimestamp)?;
        let exp = iat
            .checked_add(self.token_lifetime)
            .ok_or(TokenError::InvalidTimestamp)?;

        let claims = Claims {
            sub: subject_id,
            role,
            jti: Uuid::new_v4(),
            iat,
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)?;

        Ok(IssuedToken {
            token,
            expires_at: to_datetime(exp)?,
        })
    }

    /// Verify a token's algorithm, signature and expiry, returning its identity
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub(crate) fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;

        let exp = i64::try_from(claims.exp).map_err(|_| TokenError::InvalidTimestamp)?;
        if now.timestamp() >= exp {
            return Err(TokenError::Expired);
        }

        Ok(Identity {
            subject_id: claims.sub,
            role: claims.role,
            issued_at: to_datetime(claims.iat)?,
            expires_at: to_datetime(claims.exp)?,
            token: token.to_owned(),
        })
    }

    /// Token lifetime in seconds
    pub fn token_lifetime(&self) -> u64 {
        self.token_lifetime
    }
}

fn to_datetime(secs: u64) -> Result<DateTime<Utc>, TokenError> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or(TokenError::InvalidTimestamp)
}
