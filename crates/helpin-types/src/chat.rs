//! Chat message and request types.
//!
//! A chat request carries the client's running history: an ordered list of
//! user/assistant turns whose last entry is normally the new user message.
//! System instructions never travel over the wire; the gateway prepends its
//! own fixed instruction before invoking the model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::GatewayError;

/// Maximum number of messages accepted in one chat request.
pub const MAX_CHAT_MESSAGES: usize = 20;

/// Maximum length of a single chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Author of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(format!("invalid chat role: '{other}'")),
        }
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Conversation being resumed. When present, a completed exchange
    /// updates that record instead of creating a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
}

/// Lifecycle of one chat request inside the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatPhase {
    Received,
    RateChecked,
    Rejected,
    Streaming,
    Completed,
    Aborted,
    Failed,
}

impl ChatPhase {
    /// Whether the request can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChatPhase::Rejected | ChatPhase::Completed | ChatPhase::Aborted | ChatPhase::Failed
        )
    }

    /// Terminal phase for a request that stopped before streaming.
    pub fn refused_by(error: &GatewayError) -> Self {
        match error {
            GatewayError::RateLimitExceeded { .. } => ChatPhase::Rejected,
            _ => ChatPhase::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatPhase::Received => "received",
            ChatPhase::RateChecked => "rate_checked",
            ChatPhase::Rejected => "rejected",
            ChatPhase::Streaming => "streaming",
            ChatPhase::Completed => "completed",
            ChatPhase::Aborted => "aborted",
            ChatPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for ChatPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
