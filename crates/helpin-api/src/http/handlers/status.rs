//! Quota status endpoint.

use axum::Json;
use axum::extract::State;

use helpin_types::quota::QuotaStatus;

use crate::http::extractors::auth::Principal;
use crate::state::AppState;

/// GET /api/ai/status - Current window usage. Consumes nothing.
pub async fn get_status(
    State(state): State<AppState>,
    Principal(principal): Principal,
) -> Json<QuotaStatus> {
    Json(state.limiter.status(&principal))
}
