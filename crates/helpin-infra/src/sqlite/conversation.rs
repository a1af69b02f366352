//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `helpin-core` using sqlx with
//! split read/write pools. Messages are stored as a JSON array in one column.
//! Timestamps are fixed-width RFC 3339 strings so text order equals time order.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use uuid::Uuid;

use helpin_core::conversation::ConversationRepository;
use helpin_types::chat::ChatMessage;
use helpin_types::conversation::{ConversationRecord, ConversationSummary};
use helpin_types::error::RepositoryError;
use helpin_types::principal::PrincipalId;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: String,
    owner_id: String,
    title: String,
    messages: String,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            title: row.try_get("title")?,
            messages: row.try_get("messages")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_record(self) -> Result<ConversationRecord, RepositoryError> {
        let messages: Vec<ChatMessage> = serde_json::from_str(&self.messages)
            .map_err(|e| RepositoryError::Query(format!("invalid messages json: {e}")))?;
        Ok(ConversationRecord {
            id: parse_id(&self.id)?,
            owner_id: PrincipalId::new(self.owner_id),
            title: self.title,
            messages,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct SummaryRow {
    id: String,
    title: String,
    updated_at: String,
}

impl SummaryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_summary(self) -> Result<ConversationSummary, RepositoryError> {
        Ok(ConversationSummary {
            id: parse_id(&self.id)?,
            title: self.title,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn parse_id(s: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid conversation id: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode_messages(messages: &[ChatMessage]) -> Result<String, RepositoryError> {
    serde_json::to_string(messages).map_err(|e| RepositoryError::Query(e.to_string()))
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn list_summaries(
        &self,
        owner: &PrincipalId,
        limit: u32,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, updated_at FROM ai_conversations
             WHERE owner_id = ? ORDER BY updated_at DESC, id DESC LIMIT ?",
        )
        .bind(owner.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let summary_row =
                SummaryRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            summaries.push(summary_row.into_summary()?);
        }
        Ok(summaries)
    }

    async fn find(
        &self,
        owner: &PrincipalId,
        id: &Uuid,
    ) -> Result<Option<ConversationRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM ai_conversations WHERE id = ? AND owner_id = ?")
            .bind(id.to_string())
            .bind(owner.as_str())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(ref r) => {
                let conversation_row =
                    ConversationRow::from_row(r).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(conversation_row.into_record()?))
            }
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        owner: &PrincipalId,
        id: &Uuid,
        title: &str,
        messages: &[ChatMessage],
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE ai_conversations SET title = ?, messages = ?, updated_at = ?
             WHERE id = ? AND owner_id = ?",
        )
        .bind(title)
        .bind(encode_messages(messages)?)
        .bind(format_datetime(&updated_at))
        .bind(id.to_string())
        .bind(owner.as_str())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_evicting(
        &self,
        record: &ConversationRecord,
        cap: u32,
    ) -> Result<Option<Uuid>, RepositoryError> {
        let messages = encode_messages(&record.messages)?;
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM ai_conversations WHERE owner_id = ?")
                .bind(record.owner_id.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut evicted = None;
        if count >= i64::from(cap) {
            let oldest: Option<(String,)> = sqlx::query_as(
                "SELECT id FROM ai_conversations WHERE owner_id = ?
                 ORDER BY updated_at ASC, id ASC LIMIT 1",
            )
            .bind(record.owner_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

            if let Some((oldest_id,)) = oldest {
                sqlx::query("DELETE FROM ai_conversations WHERE id = ?")
                    .bind(&oldest_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                evicted = Some(parse_id(&oldest_id)?);
            }
        }

        sqlx::query(
            "INSERT INTO ai_conversations (id, owner_id, title, messages, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.owner_id.as_str())
        .bind(&record.title)
        .bind(messages)
        .bind(format_datetime(&record.created_at))
        .bind(format_datetime(&record.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                RepositoryError::Conflict(format!("conversation {} already exists", record.id))
            } else {
                RepositoryError::Query(e.to_string())
            }
        })?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(evicted)
    }

    async fn delete(&self, owner: &PrincipalId, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM ai_conversations WHERE id = ? AND owner_id = ?")
            .bind(id.to_string())
            .bind(owner.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, owner: &PrincipalId) -> Result<u32, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM ai_conversations WHERE owner_id = ?")
                .bind(owner.as_str())
                .fetch_one(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(count as u32)
    }
}
