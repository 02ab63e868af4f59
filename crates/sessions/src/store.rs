//! Storage interface and the in-memory backend.
//!
//! The orchestrator only ever talks to [`SessionStorage`]. Backends own
//! their own locking; the memory backend guards every read-modify-write
//! with a `parking_lot` mutex.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use sb_domain::error::Result;
use sb_domain::trace::TraceEvent;
use sb_domain::turn::{assign_ids, Turn};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Uniform session storage used by the orchestrator.
///
/// `save_*` replaces the stored value wholesale. Unknown or expired
/// sessions read back as empty.
#[async_trait::async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get_messages(&self, session_id: &str) -> Result<Vec<Turn>>;

    async fn save_messages(
        &self,
        session_id: &str,
        turns: Vec<Turn>,
        ttl: Option<Duration>,
    ) -> Result<()>;

    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Session-scoped system prompts.
    async fn get_system_messages(&self, session_id: &str) -> Result<Vec<String>>;

    async fn save_system_messages(
        &self,
        session_id: &str,
        messages: Vec<String>,
        ttl: Option<Duration>,
    ) -> Result<()>;
}

/// Number the turns 1..=n and hand them to the backend.
///
/// Every save performed by the core goes through here so ids are always
/// sequential regardless of what the caller supplied.
pub async fn save_transcript(
    storage: &dyn SessionStorage,
    session_id: &str,
    mut turns: Vec<Turn>,
    ttl: Option<Duration>,
) -> Result<()> {
    assign_ids(&mut turns);
    let count = turns.len();
    storage.save_messages(session_id, turns, ttl).await?;

    TraceEvent::TranscriptSaved {
        session_id: session_id.to_owned(),
        turns: count,
    }
    .emit();
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Expiring<T> {
    value: T,
    expires_at: Option<DateTime<Utc>>,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Option<Duration>) -> Self {
        let expires_at = ttl
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);
        Self { value, expires_at }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local storage with lazy TTL expiry.
#[derive(Default)]
pub struct MemoryStorage {
    transcripts: Mutex<HashMap<String, Expiring<Vec<Turn>>>>,
    system: Mutex<HashMap<String, Expiring<Vec<String>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently holding a live transcript.
    pub fn session_count(&self) -> usize {
        let now = Utc::now();
        self.transcripts
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }
}

fn read_live<T: Clone + Default>(
    map: &Mutex<HashMap<String, Expiring<T>>>,
    session_id: &str,
) -> T {
    let mut map = map.lock();
    match map.get(session_id) {
        Some(entry) if entry.is_expired(Utc::now()) => {
            map.remove(session_id);
            tracing::debug!(session_id, "session entry expired");
            T::default()
        }
        Some(entry) => entry.value.clone(),
        None => T::default(),
    }
}

#[async_trait::async_trait]
impl SessionStorage for MemoryStorage {
    async fn get_messages(&self, session_id: &str) -> Result<Vec<Turn>> {
        Ok(read_live(&self.transcripts, session_id))
    }

    async fn save_messages(
        &self,
        session_id: &str,
        turns: Vec<Turn>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.transcripts
            .lock()
            .insert(session_id.to_owned(), Expiring::new(turns, ttl));
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.transcripts.lock().remove(session_id);
        self.system.lock().remove(session_id);
        Ok(())
    }

    async fn get_system_messages(&self, session_id: &str) -> Result<Vec<String>> {
        Ok(read_live(&self.system, session_id))
    }

    async fn save_system_messages(
        &self,
        session_id: &str,
        messages: Vec<String>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.system
            .lock()
            .insert(session_id.to_owned(), Expiring::new(messages, ttl));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_session_reads_empty() {
        let store = MemoryStorage::new();
        assert!(store.get_messages("nope").await.unwrap().is_empty());
        assert!(store.get_system_messages("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_transcript_renumbers_turns() {
        let store = MemoryStorage::new();
        let mut turns = vec![Turn::user("hi"), Turn::assistant("hello")];
        turns[0].id = 7;
        turns[1].id = 7;

        save_transcript(&store, "s1", turns, None).await.unwrap();

        let back = store.get_messages("s1").await.unwrap();
        assert_eq!(back.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn expired_entries_read_back_empty() {
        let store = MemoryStorage::new();
        store
            .save_messages("s1", vec![Turn::user("hi")], Some(Duration::ZERO))
            .await
            .unwrap();
        assert!(store.get_messages("s1").await.unwrap().is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn delete_drops_transcript_and_system_messages() {
        let store = MemoryStorage::new();
        store
            .save_messages("s1", vec![Turn::user("hi")], None)
            .await
            .unwrap();
        store
            .save_system_messages("s1", vec!["be brief".into()], None)
            .await
            .unwrap();
        assert_eq!(store.session_count(), 1);

        store.delete_session("s1").await.unwrap();

        assert!(store.get_messages("s1").await.unwrap().is_empty());
        assert!(store.get_system_messages("s1").await.unwrap().is_empty());
    }
}
