//! Saved conversation endpoints.
//!
//! Every lookup is scoped to the caller. Unknown ids, malformed ids and ids
//! owned by someone else all produce the same 404.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

use helpin_types::conversation::{ConversationRecord, ConversationSummary, SaveConversationRequest};
use helpin_types::error::ConversationError;

use crate::http::error::AppError;
use crate::http::extractors::auth::Principal;
use crate::state::AppState;

/// GET /api/ai/conversations - Most recently updated first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Principal(principal): Principal,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    let summaries = state.conversations.list_summaries(&principal).await?;
    Ok(Json(summaries))
}

/// POST /api/ai/conversations - Create (201) or update (200).
///
/// The body is parsed regardless of content type: unload beacons are
/// commonly sent as `text/plain`.
pub async fn save_conversation(
    State(state): State<AppState>,
    Principal(principal): Principal,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let request: SaveConversationRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid conversation body: {e}")))?;

    let saved = state
        .conversations
        .save(
            &principal,
            request.conversation_id,
            &request.title,
            request.messages,
        )
        .await?;

    let status = if saved.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(json!({ "id": saved.id }))))
}

/// GET /api/ai/conversations/{id}
pub async fn get_conversation(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Path(id): Path<String>,
) -> Result<Json<ConversationRecord>, AppError> {
    let id = parse_id(&id)?;
    let record = state.conversations.load(&principal, &id).await?;
    Ok(Json(record))
}

/// DELETE /api/ai/conversations/{id}
pub async fn delete_conversation(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id)?;
    state.conversations.delete(&principal, &id).await?;
    Ok(Json(json!({ "ok": true })))
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse()
        .map_err(|_| AppError::from(ConversationError::NotFound))
}
