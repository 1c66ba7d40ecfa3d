use crate::debrief::Debrief;
use crate::live::transcript::coalesce;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who produced a piece of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Model,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Model => "model",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(s)
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}' (expected easy, medium or hard)")),
        }
    }
}

/// Lifecycle of a session record: live, ended, debriefed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
    Analyzed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Analyzed => "analyzed",
        }
    }
}

/// What the candidate chose on the setup screen.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub role: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, alias = "jd", skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<String>,
}

impl SessionConfig {
    pub fn new(role: &str, difficulty: Difficulty) -> Self {
        Self {
            role: role.to_string(),
            difficulty,
            job_description: None,
            resume: None,
        }
    }

    pub fn with_job_description(mut self, jd: &str) -> Self {
        self.job_description = non_blank(jd);
        self
    }

    pub fn with_resume(mut self, resume: &str) -> Self {
        self.resume = non_blank(resume);
        self
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// One persisted transcript fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub role: Speaker,
    pub text: String,
    /// Client clock, milliseconds since the Unix epoch. Display aid only.
    pub timestamp: i64,
}

impl TranscriptTurn {
    pub fn now(role: Speaker, text: &str) -> Self {
        Self {
            role,
            text: text.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub config: SessionConfig,
    #[serde(default)]
    pub transcript: Vec<TranscriptTurn>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debrief: Option<Debrief>,
}

impl Session {
    pub fn new(id: String, user_id: &str, config: SessionConfig) -> Self {
        Self {
            id,
            user_id: user_id.to_string(),
            start_time: Utc::now(),
            end_time: None,
            config,
            transcript: Vec::new(),
            status: SessionStatus::Active,
            debrief: None,
        }
    }

    /// The transcript as `[role]: text` lines, one per speaker turn.
    pub fn transcript_text(&self) -> String {
        coalesce(self.transcript.iter().map(|t| (t.role, t.text.as_str())))
            .iter()
            .map(|line| format!("[{}]: {}", line.speaker.as_str(), line.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_jd_field_is_accepted() {
        let cfg: SessionConfig =
            serde_json::from_str(r#"{"role":"SRE","difficulty":"hard","jd":"On-call"}"#).unwrap();
        assert_eq!(cfg.difficulty, Difficulty::Hard);
        assert_eq!(cfg.job_description.as_deref(), Some("On-call"));
    }

    #[test]
    fn transcript_text_merges_fragment_runs() {
        let mut session = Session::new("s1".into(), "u1", SessionConfig::new("SRE", Difficulty::Easy));
        for (role, text) in [
            (Speaker::Model, "Hi, "),
            (Speaker::Model, "welcome."),
            (Speaker::User, "Thanks!"),
        ] {
            session.transcript.push(TranscriptTurn::now(role, text));
        }
        assert_eq!(session.transcript_text(), "[model]: Hi, welcome.\n[user]: Thanks!");
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("brutal".parse::<Difficulty>().is_err());
    }
}
