//! Streaming chat endpoint.
//!
//! POST /api/ai/chat
//!
//! Everything that can fail with a status code (validation, quota, model
//! connection) happens before the response head is sent. After that the
//! body is the model's text, flushed fragment by fragment; a model failure
//! mid-stream cuts the connection instead of producing an error body.
//!
//! The relay runs on its own task and writes into a bounded channel. When
//! the client goes away axum drops the body, the channel closes, and the
//! relay aborts the model call.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

use helpin_core::relay::{BodyChunk, ResponseHead, channel_sink};
use helpin_types::chat::ChatRequest;
use helpin_types::error::GatewayError;

use crate::http::error::AppError;
use crate::http::extractors::auth::Principal;
use crate::state::AppState;

/// Fragments allowed to queue ahead of a slow client.
const BODY_BUFFER: usize = 32;

pub const X_RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-rate-limit-remaining");
pub const X_RATE_LIMIT_MAX: HeaderName = HeaderName::from_static("x-rate-limit-max");
pub const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// POST /api/ai/chat - Stream the tutor's reply as plain text.
pub async fn stream_chat(
    State(state): State<AppState>,
    Principal(principal): Principal,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;

    let session = state.gateway.begin(&principal, request).await?;
    let span = tracing::info_span!("chat_stream", session = %session.id(), principal = %principal);

    let (sink, head_rx, body_rx) = channel_sink(BODY_BUFFER);
    let cancel = state.shutdown.child_token();
    let gateway = Arc::clone(&state.gateway);

    tokio::spawn(
        async move {
            let outcome = gateway.stream(session, sink, &cancel).await;
            tracing::debug!(
                phase = %outcome.phase,
                fragments = outcome.fragments,
                saved = ?outcome.saved.map(|s| s.id),
                "chat stream finished"
            );
        }
        .instrument(span),
    );

    // The relay commits the head before anything else; a dropped sender
    // means it gave up before the response began.
    let head = head_rx.await.map_err(|_| {
        AppError::from(GatewayError::MidStreamFailure(
            "stream ended before the response head".to_string(),
        ))
    })?;

    Ok(streaming_response(head, body_rx))
}

fn streaming_response(head: ResponseHead, body: mpsc::Receiver<BodyChunk>) -> Response {
    let mut response = Response::new(Body::from_stream(ReceiverStream::new(body)));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(head.content_type));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-transform"));
    headers.insert(X_ACCEL_BUFFERING, HeaderValue::from_static("no"));
    headers.insert(X_RATE_LIMIT_REMAINING, HeaderValue::from(head.quota.remaining));
    headers.insert(X_RATE_LIMIT_MAX, HeaderValue::from(head.quota.max));
    response
}
