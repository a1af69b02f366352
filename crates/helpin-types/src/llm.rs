//! Model invocation types.
//!
//! The gateway talks to a text-generation backend through a narrow request
//! shape: a system instruction, the client's history, and two sampling knobs.

use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;

/// Request sent to a model invoker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Errors from a model backend.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("model backend is not configured")]
    NotConfigured,

    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
