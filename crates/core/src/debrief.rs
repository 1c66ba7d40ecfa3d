//! The structured performance report produced after an interview.
//!
//! Every field defaults so a partially filled model response still parses;
//! [`Debrief::normalize`] then pulls scores back into the 0–100 range.

use crate::error::{ServiceError, StoreError};
use crate::generative::{GenerateRequest, GenerativeModel, parse_json};
use crate::graph_store::SkillGraphStore;
use crate::prompt::debrief_prompt;
use crate::session_store::SessionStore;
use crate::skills::{MasteryUpdate, SkillMatcher};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

pub const DEFAULT_DEBRIEF_LANGUAGE: &str = "Simplified Chinese";

/// Minimum fuzzy score for a proposed skill name to count as a known skill.
const SKILL_MATCH_THRESHOLD: i64 = 50;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Debrief {
    pub session_summary: SessionSummary,
    pub conversation_summary: String,
    pub scores: Scores,
    pub strengths: Vec<Strength>,
    pub improvements: Vec<Improvement>,
    pub delivery_metrics: DeliveryMetrics,
    pub moments_that_mattered: Vec<Moment>,
    pub question_recap: Vec<QuestionRecap>,
    pub skill_updates: Vec<SkillUpdate>,
    pub next_interview_checklist: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes_if_low_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSummary {
    pub session_status: String,
    pub planned_duration_minutes: Option<i64>,
    pub actual_duration_minutes: Option<i64>,
    pub role_guess: String,
    pub company: String,
    pub interview_type: String,
    pub difficulty: String,
    pub topics_discussed: Vec<TopicDiscussed>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicDiscussed {
    pub topic: String,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scores {
    pub overall: i64,
    pub communication_structure_star: i64,
    pub role_fit: i64,
    pub confidence_clarity: i64,
    pub delivery: i64,
    pub technical_depth: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Evidence {
    pub timestamp_start: String,
    pub timestamp_end: String,
    pub quote: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Strength {
    pub title: String,
    pub evidence: Evidence,
    pub why_it_matters: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Improvement {
    pub title: String,
    pub issue: String,
    pub evidence: Evidence,
    pub better_answer_example: String,
    pub micro_exercise: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryMetrics {
    pub filler_word_estimate: i64,
    pub pace_wpm_estimate: i64,
    pub long_pause_estimate: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Moment {
    pub label: String,
    pub timestamp_start: String,
    pub timestamp_end: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionRecap {
    pub question: String,
    pub answer_summary: String,
    pub assessment: String,
}

/// A proposed mastery change for one skill, 0–100.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillUpdate {
    pub name: String,
    pub score: i64,
}

fn clamp_score(v: i64) -> i64 {
    v.clamp(0, 100)
}

impl Debrief {
    /// Clamps every score into 0..=100 and drops unnamed skill proposals.
    pub fn normalize(mut self) -> Self {
        let s = &mut self.scores;
        for score in [
            &mut s.overall,
            &mut s.communication_structure_star,
            &mut s.role_fit,
            &mut s.confidence_clarity,
            &mut s.delivery,
            &mut s.technical_depth,
        ] {
            *score = clamp_score(*score);
        }
        self.skill_updates.retain(|u| !u.name.trim().is_empty());
        for update in &mut self.skill_updates {
            update.score = clamp_score(update.score);
        }
        self
    }
}

fn evidence_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "timestamp_start": { "type": "STRING" },
            "timestamp_end": { "type": "STRING" },
            "quote": { "type": "STRING" }
        }
    })
}

/// The response schema sent with every debrief request.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "session_summary": {
                "type": "OBJECT",
                "properties": {
                    "session_status": { "type": "STRING", "enum": ["ended_early", "completed"] },
                    "planned_duration_minutes": { "type": "INTEGER" },
                    "actual_duration_minutes": { "type": "INTEGER" },
                    "role_guess": { "type": "STRING" },
                    "company": { "type": "STRING" },
                    "interview_type": { "type": "STRING" },
                    "difficulty": { "type": "STRING" },
                    "topics_discussed": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "topic": { "type": "STRING" },
                                "notes": { "type": "ARRAY", "items": { "type": "STRING" } }
                            }
                        }
                    }
                }
            },
            "conversation_summary": { "type": "STRING" },
            "scores": {
                "type": "OBJECT",
                "properties": {
                    "overall": { "type": "INTEGER" },
                    "communication_structure_star": { "type": "INTEGER" },
                    "role_fit": { "type": "INTEGER" },
                    "confidence_clarity": { "type": "INTEGER" },
                    "delivery": { "type": "INTEGER" },
                    "technical_depth": { "type": "INTEGER" }
                }
            },
            "strengths": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "evidence": evidence_schema(),
                        "why_it_matters": { "type": "STRING" }
                    }
                }
            },
            "improvements": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "issue": { "type": "STRING" },
                        "evidence": evidence_schema(),
                        "better_answer_example": { "type": "STRING" },
                        "micro_exercise": { "type": "STRING" }
                    }
                }
            },
            "delivery_metrics": {
                "type": "OBJECT",
                "properties": {
                    "filler_word_estimate": { "type": "INTEGER" },
                    "pace_wpm_estimate": { "type": "INTEGER" },
                    "long_pause_estimate": { "type": "INTEGER" }
                }
            },
            "moments_that_mattered": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "label": { "type": "STRING" },
                        "timestamp_start": { "type": "STRING" },
                        "timestamp_end": { "type": "STRING" },
                        "reason": { "type": "STRING" }
                    }
                }
            },
            "question_recap": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "question": { "type": "STRING" },
                        "answer_summary": { "type": "STRING" },
                        "assessment": { "type": "STRING" }
                    }
                }
            },
            "skill_updates": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "score": { "type": "INTEGER" }
                    }
                }
            },
            "next_interview_checklist": { "type": "ARRAY", "items": { "type": "STRING" } },
            "notes_if_low_data": { "type": "STRING" }
        },
        "required": [
            "session_summary",
            "conversation_summary",
            "scores",
            "strengths",
            "improvements",
            "delivery_metrics",
            "moments_that_mattered",
            "next_interview_checklist"
        ]
    })
}

/// Produces the debrief for a stored session, saves it, and feeds the skill
/// scores back into the user's graph.
pub struct DebriefGenerator {
    model: Arc<dyn GenerativeModel>,
    sessions: Arc<dyn SessionStore>,
    graph: Arc<dyn SkillGraphStore>,
    language: String,
}

impl DebriefGenerator {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        sessions: Arc<dyn SessionStore>,
        graph: Arc<dyn SkillGraphStore>,
    ) -> Self {
        Self {
            model,
            sessions,
            graph,
            language: DEFAULT_DEBRIEF_LANGUAGE.to_string(),
        }
    }

    /// Language the report text is written in.
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Generates (or regenerates) the debrief for `session_id`.
    pub async fn generate(&self, session_id: &str) -> Result<Debrief, ServiceError> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;

        let transcript = session.transcript_text();
        if transcript.trim().is_empty() {
            tracing::warn!("Transcript of {} is empty, generating a minimal debrief", session_id);
        }

        let request = GenerateRequest::text(debrief_prompt(&session.config, &transcript, &self.language))
            .with_schema(response_schema());
        let raw = self.model.generate(request).await?;
        let debrief = parse_json::<Debrief>(&raw)?.normalize();

        self.sessions.save_debrief(session_id, &debrief).await?;
        tracing::info!(
            "Debrief saved for {} (overall {})",
            session_id,
            debrief.scores.overall
        );

        self.update_mastery(&session.user_id, &debrief).await;
        Ok(debrief)
    }

    // Graph failures are logged; the debrief is already saved.
    async fn update_mastery(&self, user_id: &str, debrief: &Debrief) {
        if debrief.skill_updates.is_empty() {
            return;
        }
        let known = match self.graph.user_skills(user_id).await {
            Ok(skills) => skills.into_iter().map(|s| s.name).collect(),
            Err(e) => {
                tracing::error!("Failed to read skills for {}: {}", user_id, e);
                return;
            }
        };
        let matcher = SkillMatcher::new(known);
        let updates: Vec<MasteryUpdate> = debrief
            .skill_updates
            .iter()
            .filter_map(|proposal| match matcher.resolve(&proposal.name, SKILL_MATCH_THRESHOLD) {
                Some(name) => Some(MasteryUpdate::new(name, proposal.score)),
                None => {
                    tracing::debug!("No graph skill matches '{}', skipping", proposal.name);
                    None
                }
            })
            .collect();

        if let Err(e) = self.graph.apply_mastery(user_id, &updates).await {
            tracing::error!("Failed to update graph mastery: {}", e);
        }
    }
}
