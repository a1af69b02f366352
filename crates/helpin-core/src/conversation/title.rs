//! Conversation title derivation.

use helpin_types::chat::{ChatMessage, ChatRole};
use helpin_types::conversation::DERIVED_TITLE_CHARS;

/// Title used when no user message has any text.
pub const FALLBACK_TITLE: &str = "שיחה חדשה";

/// Derive a title from the first non-blank user message.
///
/// Whitespace runs collapse to single spaces and the result is cut to
/// [`DERIVED_TITLE_CHARS`] characters (not bytes).
pub fn derive_title(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter(|m| m.role == ChatRole::User)
        .map(|m| m.content.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|s| !s.is_empty())
        .map(|s| {
            let cut: String = s.chars().take(DERIVED_TITLE_CHARS).collect();
            cut.trim_end().to_string()
        })
        .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}
