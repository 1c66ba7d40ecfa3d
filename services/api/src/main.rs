use anyhow::Context;
use interview_api::config::Config;
use interview_api::state::AppState;
use interview_core::backends::{open_graph_store, open_session_store};
use interview_core::generative::GeminiTextClient;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    info!("Configuration loaded, log level {}", config.log_level);

    let api_key = match &config.gemini_api_key {
        Some(key) => key.clone(),
        None => {
            warn!("GEMINI_API_KEY not set; generation and /api/token will fail");
            SecretString::from(String::new())
        }
    };
    let model = Arc::new(GeminiTextClient::new(api_key, config.text_model.clone()));

    let sessions = open_session_store(config.mongo.as_ref())
        .await
        .context("Failed to open the session store")?;
    let graph = open_graph_store(config.neo4j.as_ref());

    let state = AppState::new(
        model,
        sessions,
        graph,
        &config.debrief_language,
        config.gemini_api_key.clone(),
    );
    interview_api::serve(state, config.bind_address).await
}
