/// Failures talking to the session document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("document store error: {0}")]
    Backend(String),
    #[error("failed to encode session document: {0}")]
    Encoding(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(e: bson::ser::Error) -> Self {
        StoreError::Encoding(e.to_string())
    }
}

/// Failures talking to the skill graph database.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("graph request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("graph query rejected ({code}): {message}")]
    Query { code: String, message: String },
    #[error("unexpected graph response: {0}")]
    Decode(String),
}

/// Failures calling the text/structured generation endpoint.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generation endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generation response had no text")]
    Empty,
    #[error("failed to parse AI response: {excerpt}")]
    Malformed { excerpt: String },
}

/// Failures obtaining a credential for the live endpoint.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("API key not provided and no token endpoint configured")]
    Missing,
    #[error("token endpoint failed: {0}")]
    TokenFetch(String),
}

/// Errors surfaced by the orchestration services and the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Cuts `raw` down to at most `max` characters for error messages.
pub fn excerpt(raw: &str, max: usize) -> String {
    raw.chars().take(max).collect()
}
