//! Saved conversation types.
//!
//! A principal may keep a small, bounded history of past exchanges. Records
//! are listed as summaries (no message bodies) and loaded in full on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::ChatMessage;
use crate::principal::PrincipalId;

/// Maximum number of saved conversations per principal.
pub const MAX_CONVERSATIONS_PER_OWNER: u32 = 10;

/// Maximum number of messages stored in one conversation.
pub const MAX_STORED_MESSAGES: usize = 40;

/// Maximum length of a conversation title, in characters.
pub const MAX_TITLE_CHARS: usize = 100;

/// Length of a title derived from the first user message, in characters.
pub const DERIVED_TITLE_CHARS: usize = 60;

/// A saved exchange, owned by exactly one principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: Uuid,
    pub owner_id: PrincipalId,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            title: self.title.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Listing entry for a saved conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /conversations`.
///
/// Sent both by the explicit save action and by the page-unload beacon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConversationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
    pub title: String,
    pub messages: Vec<ChatMessage>,
}

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedConversation {
    pub id: Uuid,
    /// True when a new record was created rather than an existing one updated.
    pub created: bool,
    /// Record removed to make room under the per-owner cap, if any.
    pub evicted: Option<Uuid>,
}
