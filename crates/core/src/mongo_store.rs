//! MongoDB-backed [`SessionStore`].

use crate::debrief::Debrief;
use crate::error::StoreError;
use crate::model::{Session, SessionConfig, SessionStatus, TranscriptTurn};
use crate::session_store::SessionStore;
use async_trait::async_trait;
use bson::{DateTime, doc};
use futures::TryStreamExt;
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};

pub const SESSIONS_COLLECTION: &str = "sessions";

/// The stored shape of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionDocument {
    #[serde(rename = "_id")]
    id: String,
    user_id: String,
    start_time: DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_time: Option<DateTime>,
    config: SessionConfig,
    #[serde(default)]
    transcript: Vec<TranscriptTurn>,
    #[serde(default)]
    status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    debrief: Option<Debrief>,
}

impl From<SessionDocument> for Session {
    fn from(d: SessionDocument) -> Self {
        Session {
            id: d.id,
            user_id: d.user_id,
            start_time: d.start_time.to_chrono(),
            end_time: d.end_time.map(|t| t.to_chrono()),
            config: d.config,
            transcript: d.transcript,
            status: d.status,
            debrief: d.debrief,
        }
    }
}

#[derive(Clone)]
pub struct MongoSessionStore {
    sessions: Collection<SessionDocument>,
}

impl MongoSessionStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        tracing::info!("Connecting to MongoDB database '{}'", database);
        let client = Client::with_uri_str(uri).await?;
        client
            .database(database)
            .run_command(doc! { "ping": 1 })
            .await?;
        tracing::info!("Connected to MongoDB");
        Ok(Self {
            sessions: client.database(database).collection(SESSIONS_COLLECTION),
        })
    }

    async fn update(&self, id: &str, update: bson::Document) -> Result<(), StoreError> {
        let result = self.sessions.update_one(doc! { "_id": id }, update).await?;
        if result.matched_count == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MongoSessionStore {
    async fn create(&self, user_id: &str, config: SessionConfig) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let document = SessionDocument {
            id: id.clone(),
            user_id: user_id.to_string(),
            start_time: DateTime::now(),
            end_time: None,
            config,
            transcript: Vec::new(),
            status: SessionStatus::Active,
            debrief: None,
        };
        self.sessions.insert_one(document).await?;
        tracing::debug!("Created session {} for {}", id, user_id);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let found = self.sessions.find_one(doc! { "_id": id }).await?;
        Ok(found.map(Session::from))
    }

    async fn append_turn(&self, id: &str, turn: TranscriptTurn) -> Result<(), StoreError> {
        let turn = bson::to_bson(&turn)?;
        self.update(id, doc! { "$push": { "transcript": turn } }).await
    }

    async fn mark_ended(&self, id: &str) -> Result<(), StoreError> {
        self.update(
            id,
            doc! { "$set": {
                "status": SessionStatus::Completed.as_str(),
                "endTime": DateTime::now(),
            } },
        )
        .await
    }

    async fn save_debrief(&self, id: &str, debrief: &Debrief) -> Result<(), StoreError> {
        let debrief = bson::to_bson(debrief)?;
        self.update(
            id,
            doc! { "$set": {
                "debrief": debrief,
                "status": SessionStatus::Analyzed.as_str(),
            } },
        )
        .await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        let cursor = self
            .sessions
            .find(doc! { "userId": user_id })
            .sort(doc! { "startTime": -1 })
            .await?;
        let documents: Vec<SessionDocument> = cursor.try_collect().await?;
        Ok(documents.into_iter().map(Session::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Speaker};

    #[test]
    fn document_uses_camel_case_and_bson_dates() {
        let document = SessionDocument {
            id: "s1".into(),
            user_id: "u1".into(),
            start_time: DateTime::from_millis(1_700_000_000_000),
            end_time: None,
            config: SessionConfig::new("SRE", Difficulty::Hard),
            transcript: vec![TranscriptTurn {
                role: Speaker::User,
                text: "hi".into(),
                timestamp: 1,
            }],
            status: SessionStatus::Active,
            debrief: None,
        };
        let stored = bson::to_document(&document).unwrap();
        assert_eq!(stored.get_str("_id").unwrap(), "s1");
        assert_eq!(stored.get_str("userId").unwrap(), "u1");
        assert!(stored.get_datetime("startTime").is_ok());
        assert_eq!(stored.get_str("status").unwrap(), "active");
        assert!(!stored.contains_key("endTime"));

        let session = Session::from(bson::from_document::<SessionDocument>(stored).unwrap());
        assert_eq!(session.start_time.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(session.transcript[0].role, Speaker::User);
    }

    #[tokio::test]
    #[ignore] // needs a running MongoDB at MONGODB_URI
    async fn round_trip_against_live_database() {
        let uri = std::env::var("MONGODB_URI").expect("MONGODB_URI must be set");
        let store = MongoSessionStore::connect(&uri, "interview_coach_test").await.unwrap();
        let id = store
            .create("it-user", SessionConfig::new("SRE", Difficulty::Easy))
            .await
            .unwrap();
        store.append_turn(&id, TranscriptTurn::now(Speaker::Model, "Hello")).await.unwrap();
        store.mark_ended(&id).await.unwrap();
        let session = store.get(&id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.transcript.len(), 1);
    }
}
