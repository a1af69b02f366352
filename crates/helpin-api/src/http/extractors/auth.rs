//! Bearer token authentication extractor.
//!
//! Extracts and verifies the credential from:
//! - `Authorization: Bearer <jwt>` header
//! - `?token=<jwt>` query parameter (page-unload beacons cannot set headers)
//!
//! The header wins when both are present.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

use helpin_types::principal::PrincipalId;

use crate::http::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Authenticated caller. Extracting this validates the token.
#[derive(Debug, Clone)]
pub struct Principal(pub PrincipalId);

impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)?;

        match state.verifier.verify(&token) {
            Ok(principal) => Ok(Principal(principal)),
            Err(e) => {
                tracing::debug!(error = %e, "rejected credential");
                Err(AppError::Unauthorized(
                    "Unauthorized: Invalid token".to_string(),
                ))
            }
        }
    }
}

/// Extract the raw token from the request.
fn extract_token(parts: &Parts) -> Result<String, AppError> {
    // Try Authorization: Bearer <jwt>
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }
    }

    // Fall back to ?token=<jwt>
    let from_query = Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|token| !token.is_empty());
    if let Some(token) = from_query {
        return Ok(token);
    }

    Err(AppError::Unauthorized(
        "Unauthorized: No token provided".to_string(),
    ))
}
