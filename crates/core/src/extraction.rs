//! Resume / job-description text to skill graph.

use crate::error::{GenerationError, ServiceError};
use crate::generative::{GenerateRequest, GenerativeModel, parse_json};
use crate::graph_store::SkillGraphStore;
use crate::prompt::EXTRACTION_PROMPT;
use crate::skills::ExtractedSkill;
use std::collections::HashSet;
use std::sync::Arc;

/// Joins the texts the way the extraction prompt expects them.
pub fn compose_input(resume: &str, job_description: &str) -> String {
    let mut text = String::new();
    if !resume.trim().is_empty() {
        text.push_str(&format!("resumetext:\n{resume}\n\n"));
    }
    if !job_description.trim().is_empty() {
        text.push_str(&format!("Job Description:\n{job_description}"));
    }
    text
}

pub struct SkillExtractor {
    model: Arc<dyn GenerativeModel>,
    graph: Arc<dyn SkillGraphStore>,
}

impl SkillExtractor {
    pub fn new(model: Arc<dyn GenerativeModel>, graph: Arc<dyn SkillGraphStore>) -> Self {
        Self { model, graph }
    }

    /// Asks the model for the skills in `text`. Blank and repeated names are
    /// dropped.
    pub async fn extract(&self, text: &str) -> Result<Vec<ExtractedSkill>, GenerationError> {
        let request = GenerateRequest::text(text)
            .with_system(EXTRACTION_PROMPT)
            .with_json_output()
            .with_temperature(0.0);
        let raw = self.model.generate(request).await?;
        let skills: Vec<ExtractedSkill> = parse_json(&raw)?;

        let mut seen = HashSet::new();
        Ok(skills
            .into_iter()
            .map(|mut s| {
                s.name = s.name.trim().to_string();
                s
            })
            .filter(|s| !s.name.is_empty() && seen.insert(s.name.to_lowercase()))
            .collect())
    }

    /// Extracts skills from a resume and/or job description and merges them
    /// into the user's graph. Returns what was extracted.
    pub async fn sync(
        &self,
        user_id: &str,
        resume: &str,
        job_description: &str,
    ) -> Result<Vec<ExtractedSkill>, ServiceError> {
        tracing::info!("Starting graph sync for user {}", user_id);
        let text = compose_input(resume, job_description);
        if text.trim().is_empty() {
            tracing::warn!("No text to extract skills from");
            return Ok(Vec::new());
        }

        let skills = self.extract(&text).await?;
        if skills.is_empty() {
            tracing::warn!("No skills found in the supplied text");
            return Ok(skills);
        }
        self.graph.upsert_skills(user_id, &skills).await?;
        Ok(skills)
    }
}
