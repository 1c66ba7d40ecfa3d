//! Opens the configured stores, falling back to in-memory ones.

use crate::error::StoreError;
use crate::graph_store::{MemoryGraphStore, SkillGraphStore};
use crate::mongo_store::MongoSessionStore;
use crate::neo4j::{CypherClient, Neo4jGraphStore};
use crate::session_store::{MemorySessionStore, SessionStore};
use secrecy::SecretString;
use std::sync::Arc;

#[derive(Clone)]
pub struct MongoSettings {
    pub uri: String,
    pub database: String,
}

#[derive(Clone)]
pub struct Neo4jSettings {
    pub uri: String,
    pub username: String,
    pub password: SecretString,
    pub database: String,
}

pub async fn open_session_store(
    settings: Option<&MongoSettings>,
) -> Result<Arc<dyn SessionStore>, StoreError> {
    match settings {
        Some(mongo) => Ok(Arc::new(
            MongoSessionStore::connect(&mongo.uri, &mongo.database).await?,
        )),
        None => {
            tracing::warn!("MONGODB_URI not set, sessions are kept in memory only");
            Ok(Arc::new(MemorySessionStore::new()))
        }
    }
}

pub fn open_graph_store(settings: Option<&Neo4jSettings>) -> Arc<dyn SkillGraphStore> {
    match settings {
        Some(neo4j) => {
            tracing::info!("Using Neo4j graph at {}", neo4j.uri);
            Arc::new(Neo4jGraphStore::new(CypherClient::new(
                &neo4j.uri,
                &neo4j.database,
                &neo4j.username,
                neo4j.password.clone(),
            )))
        }
        None => {
            tracing::warn!("NEO4J_URI not set, the skill graph is kept in memory only");
            Arc::new(MemoryGraphStore::new())
        }
    }
}
