//! Environment configuration for the terminal interviewer.

use interview_core::backends::{MongoSettings, Neo4jSettings};
use interview_core::debrief::DEFAULT_DEBRIEF_LANGUAGE;
use secrecy::SecretString;
use std::env;
use tracing::Level;

pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";
pub const DEFAULT_VOICE: &str = "Orus";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone)]
pub struct Config {
    pub gemini_api_key: Option<SecretString>,
    /// Backend that mints live credentials; tried before the static key.
    pub token_url: Option<String>,
    pub live_model: String,
    /// Overrides the public live endpoint, e.g. for a proxy.
    pub live_endpoint: Option<String>,
    pub voice: String,
    pub text_model: String,
    pub debrief_language: String,
    pub mongo: Option<MongoSettings>,
    pub neo4j: Option<Neo4jSettings>,
    pub log_level: Level,
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|| default.to_string())
}

impl Config {
    /// Loads configuration from the environment (and `.env`).
    ///
    // *   `GEMINI_API_KEY` and/or `GEMINI_TOKEN_URL`: at least one is required.
    // *   `GEMINI_LIVE_MODEL`, `GEMINI_VOICE`, `GEMINI_TEXT_MODEL`: (Optional) model selection.
    // *   `GEMINI_LIVE_ENDPOINT`: (Optional) WebSocket URL replacing the public endpoint.
    // *   `DEBRIEF_LANGUAGE`: (Optional) Defaults to "Simplified Chinese".
    // *   `MONGODB_*`, `NEO4J_*`: (Optional) persistent stores; in memory otherwise.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let gemini_api_key = var("GEMINI_API_KEY").map(SecretString::from);
        let token_url = var("GEMINI_TOKEN_URL");
        if gemini_api_key.is_none() && token_url.is_none() {
            return Err(ConfigError::MissingVar(
                "GEMINI_API_KEY (or GEMINI_TOKEN_URL)".to_string(),
            ));
        }

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let mongo = var("MONGODB_URI").map(|uri| MongoSettings {
            uri,
            database: var_or("MONGODB_DATABASE", "interview_coach"),
        });

        let neo4j = match var("NEO4J_URI") {
            None => None,
            Some(uri) => Some(Neo4jSettings {
                uri,
                username: var("NEO4J_USERNAME")
                    .ok_or_else(|| ConfigError::MissingVar("NEO4J_USERNAME".to_string()))?,
                password: var("NEO4J_PASSWORD")
                    .map(SecretString::from)
                    .ok_or_else(|| ConfigError::MissingVar("NEO4J_PASSWORD".to_string()))?,
                database: var_or("NEO4J_DATABASE", "neo4j"),
            }),
        };

        Ok(Self {
            gemini_api_key,
            token_url,
            live_model: var_or("GEMINI_LIVE_MODEL", DEFAULT_LIVE_MODEL),
            live_endpoint: var("GEMINI_LIVE_ENDPOINT"),
            voice: var_or("GEMINI_VOICE", DEFAULT_VOICE),
            text_model: var_or("GEMINI_TEXT_MODEL", "gemini-3-flash-preview"),
            debrief_language: var_or("DEBRIEF_LANGUAGE", DEFAULT_DEBRIEF_LANGUAGE),
            mongo,
            neo4j,
            log_level,
        })
    }
}
