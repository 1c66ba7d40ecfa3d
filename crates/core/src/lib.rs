//! Domain logic for the interview coach: sessions, the skill graph, the
//! generation-backed services and the live voice session adapter.

pub mod backends;
pub mod context;
pub mod credentials;
pub mod debrief;
pub mod error;
pub mod extraction;
pub mod generative;
pub mod graph_store;
pub mod graph_view;
pub mod live;
pub mod model;
pub mod mongo_store;
pub mod neo4j;
pub mod prompt;
pub mod resume;
pub mod session_store;
pub mod skills;

pub use error::{CredentialError, GenerationError, GraphError, ServiceError, StoreError};
pub use live::{LiveSession, LiveStatus};
pub use model::{Difficulty, Session, SessionConfig, SessionStatus, Speaker, TranscriptTurn};
