//! ConversationRepository trait definition.
//!
//! Every query is scoped by owner: a record that exists but belongs to
//! someone else behaves exactly like a missing one.

use chrono::{DateTime, Utc};
use helpin_types::chat::ChatMessage;
use helpin_types::conversation::{ConversationRecord, ConversationSummary};
use helpin_types::error::RepositoryError;
use helpin_types::principal::PrincipalId;
use uuid::Uuid;

/// Repository trait for saved conversation persistence.
///
/// Implementations live in helpin-infra (e.g., `SqliteConversationRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ConversationRepository: Send + Sync {
    /// Summaries for an owner, most recently updated first.
    fn list_summaries(
        &self,
        owner: &PrincipalId,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationSummary>, RepositoryError>> + Send;

    /// Load one record if it exists and belongs to `owner`.
    fn find(
        &self,
        owner: &PrincipalId,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ConversationRecord>, RepositoryError>> + Send;

    /// Overwrite title and messages of an owned record.
    ///
    /// Returns `false` when nothing matched (missing or foreign).
    fn update(
        &self,
        owner: &PrincipalId,
        id: &Uuid,
        title: &str,
        messages: &[ChatMessage],
        updated_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Insert a record, first evicting the owner's least-recently-updated
    /// record if the owner already holds `cap` or more.
    ///
    /// Count, evict and insert happen atomically. Returns the evicted id.
    fn insert_evicting(
        &self,
        record: &ConversationRecord,
        cap: u32,
    ) -> impl std::future::Future<Output = Result<Option<Uuid>, RepositoryError>> + Send;

    /// Delete an owned record. Returns `false` when nothing matched.
    fn delete(
        &self,
        owner: &PrincipalId,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Number of records held by `owner`.
    fn count(
        &self,
        owner: &PrincipalId,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;
}
