//! ConversationStore: capped, owner-scoped upsert over a repository.
//!
//! Saves for one owner are serialised through a per-owner async lock so the
//! "count, evict oldest, create" sequence can never interleave with another
//! create for the same owner. Different owners never share a lock.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use helpin_types::chat::ChatMessage;
use helpin_types::conversation::{
    ConversationRecord, ConversationSummary, MAX_CONVERSATIONS_PER_OWNER, MAX_STORED_MESSAGES,
    MAX_TITLE_CHARS, SavedConversation,
};
use helpin_types::error::ConversationError;
use helpin_types::principal::PrincipalId;

use crate::clock::{Clock, SystemClock};
use crate::conversation::repository::ConversationRepository;

/// Durable, per-owner capped collection of saved exchanges.
///
/// Generic over `ConversationRepository` so helpin-core never depends on
/// helpin-infra.
pub struct ConversationStore<R: ConversationRepository, C: Clock = SystemClock> {
    repo: R,
    clock: C,
    cap: u32,
    locks: DashMap<PrincipalId, Arc<Mutex<()>>>,
}

impl<R: ConversationRepository> ConversationStore<R> {
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, SystemClock, MAX_CONVERSATIONS_PER_OWNER)
    }
}

impl<R: ConversationRepository, C: Clock> ConversationStore<R, C> {
    pub fn with_clock(repo: R, clock: C, cap: u32) -> Self {
        Self {
            repo,
            clock,
            cap: cap.max(1),
            locks: DashMap::new(),
        }
    }

    /// Access the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    /// Up to `cap` summaries, most recently updated first.
    pub async fn list_summaries(
        &self,
        owner: &PrincipalId,
    ) -> Result<Vec<ConversationSummary>, ConversationError> {
        Ok(self.repo.list_summaries(owner, self.cap).await?)
    }

    /// Load an owned record. Missing and foreign ids both yield `NotFound`.
    pub async fn load(
        &self,
        owner: &PrincipalId,
        id: &Uuid,
    ) -> Result<ConversationRecord, ConversationError> {
        self.repo
            .find(owner, id)
            .await?
            .ok_or(ConversationError::NotFound)
    }

    /// Delete an owned record.
    pub async fn delete(&self, owner: &PrincipalId, id: &Uuid) -> Result<(), ConversationError> {
        if self.repo.delete(owner, id).await? {
            info!(principal = %owner, conversation_id = %id, "conversation deleted");
            Ok(())
        } else {
            Err(ConversationError::NotFound)
        }
    }

    /// Create or update a conversation.
    ///
    /// With an id, the owned record is updated in place and never created.
    /// Without one, a new record is created, evicting the owner's
    /// least-recently-updated record first when the cap is reached.
    pub async fn save(
        &self,
        owner: &PrincipalId,
        conversation_id: Option<Uuid>,
        title: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<SavedConversation, ConversationError> {
        validate(title, &messages)?;
        let title = title.to_string();

        let lock = self.owner_lock(owner);
        let result = {
            let _guard = lock.lock().await;
            self.save_locked(owner, conversation_id, title, messages).await
        };
        drop(lock);
        self.release_owner_lock(owner);
        result
    }

    async fn save_locked(
        &self,
        owner: &PrincipalId,
        conversation_id: Option<Uuid>,
        title: String,
        messages: Vec<ChatMessage>,
    ) -> Result<SavedConversation, ConversationError> {
        let now = self.clock.now();

        if let Some(id) = conversation_id {
            let updated = self.repo.update(owner, &id, &title, &messages, now).await?;
            if !updated {
                return Err(ConversationError::NotFound);
            }
            debug!(principal = %owner, conversation_id = %id, messages = messages.len(), "conversation updated");
            return Ok(SavedConversation {
                id,
                created: false,
                evicted: None,
            });
        }

        let record = ConversationRecord {
            id: Uuid::now_v7(),
            owner_id: owner.clone(),
            title,
            messages,
            created_at: now,
            updated_at: now,
        };
        let evicted = self.repo.insert_evicting(&record, self.cap).await?;
        if let Some(old) = evicted {
            info!(principal = %owner, evicted = %old, "conversation cap reached, evicted oldest");
        }
        info!(principal = %owner, conversation_id = %record.id, "conversation created");

        Ok(SavedConversation {
            id: record.id,
            created: true,
            evicted,
        })
    }

    fn owner_lock(&self, owner: &PrincipalId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(owner.clone()).or_default().value())
    }

    /// Drop the owner's lock entry once nobody else holds or awaits it.
    fn release_owner_lock(&self, owner: &PrincipalId) {
        self.locks
            .remove_if(owner, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }
}

/// A whitespace-only title is rejected but a valid one is stored as sent.
fn validate(title: &str, messages: &[ChatMessage]) -> Result<(), ConversationError> {
    let title_chars = title.chars().count();
    if title.trim().is_empty() || title_chars > MAX_TITLE_CHARS {
        return Err(ConversationError::Validation(format!(
            "title must be 1 to {MAX_TITLE_CHARS} characters"
        )));
    }
    if messages.is_empty() || messages.len() > MAX_STORED_MESSAGES {
        return Err(ConversationError::Validation(format!(
            "conversation must hold 1 to {MAX_STORED_MESSAGES} messages"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use helpin_types::error::RepositoryError;
    use std::sync::Mutex as StdMutex;

    /// In-memory repository. Creation deliberately yields between counting
    /// and inserting so interleaved creates would overshoot the cap.
    #[derive(Default)]
    pub(crate) struct MockConversationRepository {
        pub records: StdMutex<Vec<ConversationRecord>>,
    }

    impl MockConversationRepository {
        pub fn all(&self) -> Vec<ConversationRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    impl ConversationRepository for MockConversationRepository {
        async fn list_summaries(
            &self,
            owner: &PrincipalId,
            limit: u32,
        ) -> Result<Vec<ConversationSummary>, RepositoryError> {
            let mut owned: Vec<_> = self
                .all()
                .into_iter()
                .filter(|r| &r.owner_id == owner)
                .collect();
            owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(owned
                .iter()
                .take(limit as usize)
                .map(ConversationRecord::summary)
                .collect())
        }

        async fn find(
            &self,
            owner: &PrincipalId,
            id: &Uuid,
        ) -> Result<Option<ConversationRecord>, RepositoryError> {
            Ok(self
                .all()
                .into_iter()
                .find(|r| &r.owner_id == owner && &r.id == id))
        }

        async fn update(
            &self,
            owner: &PrincipalId,
            id: &Uuid,
            title: &str,
            messages: &[ChatMessage],
            updated_at: DateTime<Utc>,
        ) -> Result<bool, RepositoryError> {
            let mut records = self.records.lock().unwrap();
            match records
                .iter_mut()
                .find(|r| &r.owner_id == owner && &r.id == id)
            {
                Some(record) => {
                    record.title = title.to_string();
                    record.messages = messages.to_vec();
                    record.updated_at = updated_at;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn insert_evicting(
            &self,
            record: &ConversationRecord,
            cap: u32,
        ) -> Result<Option<Uuid>, RepositoryError> {
            let count = self.count(&record.owner_id).await?;
            tokio::task::yield_now().await;

            let mut records = self.records.lock().unwrap();
            let mut evicted = None;
            if count >= cap {
                let oldest = records
                    .iter()
                    .filter(|r| r.owner_id == record.owner_id)
                    .min_by_key(|r| (r.updated_at, r.id))
                    .map(|r| r.id);
                if let Some(id) = oldest {
                    records.retain(|r| r.id != id);
                    evicted = Some(id);
                }
            }
            records.push(record.clone());
            Ok(evicted)
        }

        async fn delete(&self, owner: &PrincipalId, id: &Uuid) -> Result<bool, RepositoryError> {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| !(&r.owner_id == owner && &r.id == id));
            Ok(records.len() != before)
        }

        async fn count(&self, owner: &PrincipalId) -> Result<u32, RepositoryError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| &r.owner_id == owner)
                .count() as u32)
        }
    }

    fn store() -> (
        ConversationStore<MockConversationRepository, ManualClock>,
        ManualClock,
    ) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap());
        let store =
            ConversationStore::with_clock(MockConversationRepository::default(), clock.clone(), 10);
        (store, clock)
    }

    fn exchange(question: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::user(question),
            ChatMessage::assistant("תשובה"),
        ]
    }

    #[tokio::test]
    async fn test_create_returns_fresh_ids() {
        let (store, clock) = store();
        let owner = PrincipalId::new("u1");
        let first = store.save(&owner, None, "a", exchange("a")).await.unwrap();
        clock.advance(Duration::seconds(1));
        let second = store.save(&owner, None, "b", exchange("b")).await.unwrap();

        assert!(first.created && second.created);
        assert_ne!(first.id, second.id);
        assert_eq!(store.list_summaries(&owner).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_in_place() {
        let (store, clock) = store();
        let owner = PrincipalId::new("u1");
        let saved = store.save(&owner, None, "Vectors", exchange("q")).await.unwrap();

        clock.advance(Duration::minutes(5));
        let mut longer = exchange("q");
        longer.extend(exchange("follow-up"));
        let updated = store
            .save(&owner, Some(saved.id), "Vectors 2", longer.clone())
            .await
            .unwrap();

        assert_eq!(updated.id, saved.id);
        assert!(!updated.created);
        let loaded = store.load(&owner, &saved.id).await.unwrap();
        assert_eq!(loaded.messages, longer);
        assert_eq!(loaded.title, "Vectors 2");
        assert_eq!(loaded.updated_at, clock.now());
        assert!(loaded.created_at < loaded.updated_at);
        assert_eq!(store.repo().all().len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_id_never_creates() {
        let (store, _clock) = store();
        let owner = PrincipalId::new("u1");
        let err = store
            .save(&owner, Some(Uuid::now_v7()), "t", exchange("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::NotFound));
        assert!(store.repo().all().is_empty());
    }

    #[tokio::test]
    async fn test_eleventh_create_evicts_oldest() {
        let (store, clock) = store();
        let owner = PrincipalId::new("u1");
        let mut ids = Vec::new();
        for i in 0..10 {
            let saved = store
                .save(&owner, None, &format!("t{i}"), exchange("q"))
                .await
                .unwrap();
            ids.push(saved.id);
            clock.advance(Duration::seconds(10));
        }

        // Touch the oldest so the second-oldest becomes least recently updated.
        store
            .save(&owner, Some(ids[0]), "t0 again", exchange("q"))
            .await
            .unwrap();
        clock.advance(Duration::seconds(10));

        let eleventh = store.save(&owner, None, "t10", exchange("q")).await.unwrap();
        assert_eq!(eleventh.evicted, Some(ids[1]));

        let summaries = store.list_summaries(&owner).await.unwrap();
        assert_eq!(summaries.len(), 10);
        assert_eq!(summaries[0].id, eleventh.id);
        assert!(summaries.iter().all(|s| s.id != ids[1]));
        assert!(summaries.iter().any(|s| s.id == ids[0]));
    }

    #[tokio::test]
    async fn test_foreign_records_are_invisible() {
        let (store, _clock) = store();
        let alice = PrincipalId::new("alice");
        let bob = PrincipalId::new("bob");
        let saved = store.save(&alice, None, "mine", exchange("q")).await.unwrap();

        assert!(matches!(
            store.load(&bob, &saved.id).await,
            Err(ConversationError::NotFound)
        ));
        assert!(matches!(
            store.delete(&bob, &saved.id).await,
            Err(ConversationError::NotFound)
        ));
        assert!(matches!(
            store.save(&bob, Some(saved.id), "stolen", exchange("x")).await,
            Err(ConversationError::NotFound)
        ));
        assert!(store.list_summaries(&bob).await.unwrap().is_empty());
        assert_eq!(store.load(&alice, &saved.id).await.unwrap().title, "mine");
    }

    #[tokio::test]
    async fn test_delete_then_load_not_found() {
        let (store, _clock) = store();
        let owner = PrincipalId::new("u1");
        let saved = store.save(&owner, None, "t", exchange("q")).await.unwrap();
        store.delete(&owner, &saved.id).await.unwrap();
        assert!(matches!(
            store.load(&owner, &saved.id).await,
            Err(ConversationError::NotFound)
        ));
        assert!(matches!(
            store.delete(&owner, &saved.id).await,
            Err(ConversationError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_validation() {
        let (store, _clock) = store();
        let owner = PrincipalId::new("u1");
        assert!(matches!(
            store.save(&owner, None, "   ", exchange("q")).await,
            Err(ConversationError::Validation(_))
        ));
        assert!(matches!(
            store.save(&owner, None, &"x".repeat(101), exchange("q")).await,
            Err(ConversationError::Validation(_))
        ));
        assert!(matches!(
            store.save(&owner, None, "t", Vec::new()).await,
            Err(ConversationError::Validation(_))
        ));
        let too_many = vec![ChatMessage::user("q"); 41];
        assert!(matches!(
            store.save(&owner, None, "t", too_many).await,
            Err(ConversationError::Validation(_))
        ));
        // 100 Hebrew characters are within the limit.
        assert!(store.save(&owner, None, &"ש".repeat(100), exchange("q")).await.is_ok());
    }

    #[tokio::test]
    async fn test_title_is_stored_as_sent() {
        let (store, _clock) = store();
        let owner = PrincipalId::new("u1");
        let saved = store
            .save(&owner, None, "  Fractions ", exchange("q"))
            .await
            .unwrap();
        assert_eq!(store.load(&owner, &saved.id).await.unwrap().title, "  Fractions ");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_respect_cap() {
        let clock = ManualClock::new(Utc::now());
        let store = Arc::new(ConversationStore::with_clock(
            MockConversationRepository::default(),
            clock,
            10,
        ));
        let owner = PrincipalId::new("racer");

        let tasks: Vec<_> = (0..30)
            .map(|i| {
                let store = Arc::clone(&store);
                let owner = owner.clone();
                tokio::spawn(async move {
                    store
                        .save(&owner, None, &format!("t{i}"), exchange("q"))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.repo().count(&owner).await.unwrap(), 10);
        assert_eq!(store.lock_count(), 0);
    }
}
