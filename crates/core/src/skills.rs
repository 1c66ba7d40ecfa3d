use chrono::{DateTime, Utc};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};

/// Mastery level carried on a user's HAS_SKILL edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Proficiency {
    Beginner,
    #[default]
    Intermediate,
    Expert,
}

impl Proficiency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Proficiency::Beginner => "Beginner",
            Proficiency::Intermediate => "Intermediate",
            Proficiency::Expert => "Expert",
        }
    }

    /// Lenient parse; anything unrecognized is treated as Intermediate.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Proficiency::Beginner,
            "expert" => Proficiency::Expert,
            _ => Proficiency::Intermediate,
        }
    }

    /// Maps a 0–100 interview score onto a level.
    pub fn from_score(score: i64) -> Self {
        if score >= 80 {
            Proficiency::Expert
        } else if score >= 40 {
            Proficiency::Intermediate
        } else {
            Proficiency::Beginner
        }
    }
}

fn deserialize_level<'de, D>(d: D) -> Result<Proficiency, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.as_deref().map(Proficiency::parse_lenient).unwrap_or_default())
}

/// A skill as returned by the extraction prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSkill {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, deserialize_with = "deserialize_level")]
    pub level: Proficiency,
    #[serde(default)]
    pub description: String,
    /// Adjacent skills the candidate did not claim; they form the halo.
    #[serde(default)]
    pub related: Vec<String>,
}

/// A skill the user holds, read back from the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSkill {
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub level: Option<Proficiency>,
    pub latest_score: Option<i64>,
    pub last_verified: Option<DateTime<Utc>>,
    pub last_tested: Option<DateTime<Utc>>,
}

/// A skill related to one the user holds, but not held itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HaloSkill {
    pub name: String,
    /// The held skill it hangs off.
    pub via: String,
}

/// Score applied to an existing HAS_SKILL edge after a debrief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryUpdate {
    pub name: String,
    pub score: i64,
    pub level: Proficiency,
}

impl MasteryUpdate {
    pub fn new(name: &str, score: i64) -> Self {
        let score = score.clamp(0, 100);
        Self {
            name: name.to_string(),
            score,
            level: Proficiency::from_score(score),
        }
    }
}

/// Resolves loosely written skill names ("React.js") to names already in a
/// user's graph ("React").
pub struct SkillMatcher {
    known: Vec<String>,
    matcher: SkimMatcherV2,
}

impl SkillMatcher {
    pub fn new(known: Vec<String>) -> Self {
        Self {
            known,
            matcher: SkimMatcherV2::default(),
        }
    }

    /// Exact (case-insensitive) hit first, then the best fuzzy match above
    /// `threshold`.
    pub fn resolve(&self, candidate: &str, threshold: i64) -> Option<&str> {
        let wanted = candidate.trim().to_lowercase();
        if let Some(hit) = self.known.iter().find(|k| k.to_lowercase() == wanted) {
            return Some(hit);
        }
        self.known
            .iter()
            .filter_map(|k| {
                let name = k.to_lowercase();
                // Either side may be the longer spelling.
                let forward = self.matcher.fuzzy_match(&wanted, &name).unwrap_or(0);
                let backward = self.matcher.fuzzy_match(&name, &wanted).unwrap_or(0);
                let score = forward.max(backward);
                (score > threshold).then_some((score, k.as_str()))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, name)| name)
    }
}
