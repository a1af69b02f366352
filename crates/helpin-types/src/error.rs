use thiserror::Error;

/// Errors from repository operations (used by trait definitions in helpin-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to saved conversations.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// Unknown id, or an id owned by someone else. The two are not distinguished.
    #[error("conversation not found")]
    NotFound,

    #[error("invalid conversation: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for ConversationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ConversationError::NotFound,
            other => ConversationError::Storage(other.to_string()),
        }
    }
}

/// Errors surfaced by the chat gateway and its read-only companions.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("missing or invalid credential")]
    Unauthenticated,

    #[error("rate limit of {max} messages per window exceeded, resets in {reset_in_minutes} min")]
    RateLimitExceeded { reset_in_minutes: u32, max: u32 },

    #[error("not found")]
    NotFound,

    #[error("model backend unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Raised after the response head was committed; the connection just ends.
    #[error("stream failed after response began: {0}")]
    MidStreamFailure(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<ConversationError> for GatewayError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::NotFound => GatewayError::NotFound,
            ConversationError::Validation(msg) => GatewayError::Validation(msg),
            ConversationError::Storage(msg) => GatewayError::Storage(msg),
        }
    }
}
