//! Persistence of interview sessions.

use crate::debrief::Debrief;
use crate::error::StoreError;
use crate::model::{Session, SessionConfig, SessionStatus, TranscriptTurn};
use async_trait::async_trait;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Attempts made by [`fetch_with_retry`].
pub const READ_ATTEMPTS: u32 = 3;
/// Fixed pause between those attempts.
pub const READ_RETRY_DELAY: Duration = Duration::from_millis(500);

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates an active session and returns its id.
    async fn create(&self, user_id: &str, config: SessionConfig) -> Result<String, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError>;

    async fn append_turn(&self, id: &str, turn: TranscriptTurn) -> Result<(), StoreError>;

    /// Sets the status to completed and stamps the end time.
    async fn mark_ended(&self, id: &str) -> Result<(), StoreError>;

    /// Stores (or replaces) the debrief and marks the session analyzed.
    async fn save_debrief(&self, id: &str, debrief: &Debrief) -> Result<(), StoreError>;

    /// A user's sessions, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Session>, StoreError>;
}

/// Reads a session, retrying a few times when it is not visible yet.
pub async fn fetch_with_retry(store: &dyn SessionStore, id: &str) -> Result<Session, StoreError> {
    let mut last_err = StoreError::NotFound(id.to_string());
    for attempt in 1..=READ_ATTEMPTS {
        match store.get(id).await {
            Ok(Some(session)) => return Ok(session),
            Ok(None) => last_err = StoreError::NotFound(id.to_string()),
            Err(e) => last_err = e,
        }
        if attempt < READ_ATTEMPTS {
            tracing::warn!("Session {} not readable (attempt {}), retrying", id, attempt);
            tokio::time::sleep(READ_RETRY_DELAY).await;
        }
    }
    Err(last_err)
}

/// Process-local store used when no document database is configured.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user_id: &str, config: SessionConfig) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let session = Session::new(id.clone(), user_id, config);
        self.sessions.write().await.insert(id.clone(), session);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn append_turn(&self, id: &str, turn: TranscriptTurn) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        session.transcript.push(turn);
        Ok(())
    }

    async fn mark_ended(&self, id: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        session.status = SessionStatus::Completed;
        session.end_time = Some(Utc::now());
        Ok(())
    }

    async fn save_debrief(&self, id: &str, debrief: &Debrief) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        session.debrief = Some(debrief.clone());
        session.status = SessionStatus::Analyzed;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        let mut list: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Speaker};

    #[tokio::test]
    async fn session_lifecycle_in_memory() {
        let store = MemorySessionStore::new();
        let id = store
            .create("u1", SessionConfig::new("SRE", Difficulty::Medium))
            .await
            .unwrap();

        store.append_turn(&id, TranscriptTurn::now(Speaker::Model, "Hello")).await.unwrap();
        store.append_turn(&id, TranscriptTurn::now(Speaker::User, "Hi")).await.unwrap();
        store.mark_ended(&id).await.unwrap();

        let session = store.get(&id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.end_time.is_some());
        assert_eq!(session.transcript.len(), 2);
        assert_eq!(session.transcript[0].text, "Hello");

        store.save_debrief(&id, &Debrief::default()).await.unwrap();
        let session = store.get(&id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Analyzed);
        assert!(session.debrief.is_some());
    }

    #[tokio::test]
    async fn append_to_unknown_session_fails() {
        let store = MemorySessionStore::new();
        let err = store
            .append_turn("nope", TranscriptTurn::now(Speaker::User, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn read_is_retried_three_times() {
        let mut store = MockSessionStore::new();
        let mut calls = 0;
        store.expect_get().times(3).returning(move |id| {
            calls += 1;
            if calls < 3 {
                Ok(None)
            } else {
                Ok(Some(Session::new(
                    id.to_string(),
                    "u1",
                    SessionConfig::new("SRE", Difficulty::Easy),
                )))
            }
        });

        let session = fetch_with_retry(&store, "s1").await.unwrap();
        assert_eq!(session.id, "s1");
    }

    #[tokio::test(start_paused = true)]
    async fn read_gives_up_after_three_attempts() {
        let mut store = MockSessionStore::new();
        store
            .expect_get()
            .times(3)
            .returning(|_| Err(StoreError::Backend("down".into())));

        let err = fetch_with_retry(&store, "s1").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
