//! HS256 JWT verification.
//!
//! Tokens are issued by the host application; the gateway only verifies the
//! signature and reads the principal from the `userId` claim. `exp` is
//! checked when present.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use helpin_types::principal::PrincipalId;

/// Minimum accepted secret length, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT secret must be at least {MIN_SECRET_LEN} bytes")]
    SecretTooShort,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token has an empty userId")]
    MissingPrincipal,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// JWT claims used by the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Verifies (and, for local tooling, issues) HS256 tokens.
///
/// Does NOT derive Debug: the keys are derived from the secret.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &SecretString) -> Result<Self, AuthError> {
        let bytes = secret.expose_secret().as_bytes();
        if bytes.len() < MIN_SECRET_LEN {
            return Err(AuthError::SecretTooShort);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = true;

        Ok(Self {
            decoding: DecodingKey::from_secret(bytes),
            encoding: EncodingKey::from_secret(bytes),
            validation,
        })
    }

    /// Verify `token` and return the principal it names.
    pub fn verify(&self, token: &str) -> Result<PrincipalId, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if data.claims.user_id.trim().is_empty() {
            return Err(AuthError::MissingPrincipal);
        }
        Ok(PrincipalId::new(data.claims.user_id))
    }

    /// Sign a token for `principal` valid for `ttl`.
    pub fn issue(&self, principal: &PrincipalId, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: principal.to_string(),
            exp: Some((now + ttl).timestamp()),
            iat: Some(now.timestamp()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}
