//! HTTP/REST API layer for the HelpIN gateway.
//!
//! Axum-based REST API at `/api/ai/` with bearer-token authentication,
//! a streamed plain-text chat endpoint, and CORS support.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
