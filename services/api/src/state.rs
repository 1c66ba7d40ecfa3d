use interview_core::debrief::DebriefGenerator;
use interview_core::extraction::SkillExtractor;
use interview_core::generative::GenerativeModel;
use interview_core::graph_store::SkillGraphStore;
use interview_core::resume::ResumeParser;
use interview_core::session_store::SessionStore;
use secrecy::SecretString;
use std::sync::Arc;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub graph: Arc<dyn SkillGraphStore>,
    pub extractor: Arc<SkillExtractor>,
    pub debriefs: Arc<DebriefGenerator>,
    pub resume: Arc<ResumeParser>,
    /// Key handed to browsers for the live endpoint.
    pub live_key: Option<SecretString>,
}

impl AppState {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        sessions: Arc<dyn SessionStore>,
        graph: Arc<dyn SkillGraphStore>,
        debrief_language: &str,
        live_key: Option<SecretString>,
    ) -> Self {
        Self {
            extractor: Arc::new(SkillExtractor::new(model.clone(), graph.clone())),
            debriefs: Arc::new(
                DebriefGenerator::new(model.clone(), sessions.clone(), graph.clone())
                    .with_language(debrief_language),
            ),
            resume: Arc::new(ResumeParser::new(model)),
            sessions,
            graph,
            live_key,
        }
    }
}
