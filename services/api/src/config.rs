use interview_core::backends::{MongoSettings, Neo4jSettings};
use interview_core::debrief::DEFAULT_DEBRIEF_LANGUAGE;
use secrecy::SecretString;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub gemini_api_key: Option<SecretString>,
    pub text_model: String,
    pub debrief_language: String,
    pub mongo: Option<MongoSettings>,
    pub neo4j: Option<Neo4jSettings>,
    pub log_level: Level,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|| default.to_string())
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// A `.env` file in the current directory is read first. Variables:
    ///
    /// *   `BIND_ADDRESS`: address to listen on. Defaults to "0.0.0.0:3000".
    /// *   `GEMINI_API_KEY`: (Optional) Used for text generation and handed out by `/api/token`.
    /// *   `GEMINI_TEXT_MODEL`: (Optional) Defaults to "gemini-3-flash-preview".
    /// *   `DEBRIEF_LANGUAGE`: (Optional) Language of debrief text. Defaults to "Simplified Chinese".
    /// *   `MONGODB_URI` / `MONGODB_DATABASE`: (Optional) session storage; in memory when unset.
    /// *   `NEO4J_URI` / `NEO4J_USERNAME` / `NEO4J_PASSWORD` / `NEO4J_DATABASE`: (Optional) skill graph; in memory when unset.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let bind_address = var_or("BIND_ADDRESS", "0.0.0.0:3000")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let gemini_api_key = var("GEMINI_API_KEY").map(SecretString::from);

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            gemini_api_key,
            text_model: var_or("GEMINI_TEXT_MODEL", "gemini-3-flash-preview"),
            debrief_language: var_or("DEBRIEF_LANGUAGE", DEFAULT_DEBRIEF_LANGUAGE),
            mongo: mongo_from_env(),
            neo4j: neo4j_from_env()?,
            log_level,
        })
    }
}

pub fn mongo_from_env() -> Option<MongoSettings> {
    Some(MongoSettings {
        uri: var("MONGODB_URI")?,
        database: var_or("MONGODB_DATABASE", "interview_coach"),
    })
}

/// `NEO4J_URI` switches the graph on; the credentials are then required.
pub fn neo4j_from_env() -> Result<Option<Neo4jSettings>, ConfigError> {
    let Some(uri) = var("NEO4J_URI") else {
        return Ok(None);
    };
    let username =
        var("NEO4J_USERNAME").ok_or_else(|| ConfigError::MissingVar("NEO4J_USERNAME".to_string()))?;
    let password =
        var("NEO4J_PASSWORD").ok_or_else(|| ConfigError::MissingVar("NEO4J_PASSWORD".to_string()))?;
    Ok(Some(Neo4jSettings {
        uri,
        username,
        password: SecretString::from(password),
        database: var_or("NEO4J_DATABASE", "neo4j"),
    }))
}
