//! The per-user skill graph.
//!
//! Users hold skills through HAS_SKILL edges; skills are linked to each
//! other by undirected RELATED_TO edges. Related skills a user does not
//! hold form that user's halo.

use crate::error::GraphError;
use crate::skills::{ExtractedSkill, HaloSkill, MasteryUpdate, Proficiency, UserSkill};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SkillGraphStore: Send + Sync {
    /// Merges the user, the skills, the HAS_SKILL edges and the RELATED_TO
    /// edges. Existing nodes are reused by name.
    async fn upsert_skills(&self, user_id: &str, skills: &[ExtractedSkill]) -> Result<(), GraphError>;

    /// Skills the user holds, ordered by name.
    async fn user_skills(&self, user_id: &str) -> Result<Vec<UserSkill>, GraphError>;

    /// Up to `limit` skills adjacent to the user's, ordered by name.
    async fn halo(&self, user_id: &str, limit: usize) -> Result<Vec<HaloSkill>, GraphError>;

    /// Applies interview scores to existing HAS_SKILL edges and returns how
    /// many were touched. Unknown skills are ignored.
    async fn apply_mastery(&self, user_id: &str, updates: &[MasteryUpdate]) -> Result<usize, GraphError>;
}

struct SkillNode {
    category: Option<String>,
    description: Option<String>,
}

#[derive(Clone)]
struct HasSkill {
    level: Proficiency,
    last_verified: Option<DateTime<Utc>>,
    last_tested: Option<DateTime<Utc>>,
    latest_score: Option<i64>,
}

#[derive(Default)]
struct Graph {
    users: HashSet<String>,
    skills: HashMap<String, SkillNode>,
    // user -> skill name -> edge
    holdings: HashMap<String, BTreeMap<String, HasSkill>>,
    // stored with the smaller name first
    related: BTreeSet<(String, String)>,
}

impl Graph {
    fn merge_skill(&mut self, name: &str, category: Option<&str>, description: Option<&str>) {
        let node = self.skills.entry(name.to_string()).or_insert_with(|| SkillNode {
            category: category.filter(|c| !c.is_empty()).map(str::to_string),
            description: None,
        });
        if let Some(d) = description.filter(|d| !d.is_empty()) {
            node.description = Some(d.to_string());
        }
    }

    fn relate(&mut self, a: &str, b: &str) {
        if a == b {
            return;
        }
        let pair = if a < b { (a, b) } else { (b, a) };
        self.related.insert((pair.0.to_string(), pair.1.to_string()));
    }

    fn neighbours<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.related.iter().filter_map(move |(a, b)| {
            if a == name {
                Some(b.as_str())
            } else if b == name {
                Some(a.as_str())
            } else {
                None
            }
        })
    }
}

/// Process-local graph used when no graph database is configured.
#[derive(Default)]
pub struct MemoryGraphStore {
    graph: RwLock<Graph>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SkillGraphStore for MemoryGraphStore {
    async fn upsert_skills(&self, user_id: &str, skills: &[ExtractedSkill]) -> Result<(), GraphError> {
        let mut graph = self.graph.write().await;
        graph.users.insert(user_id.to_string());
        let now = Utc::now();
        for skill in skills {
            graph.merge_skill(&skill.name, Some(&skill.category), Some(&skill.description));
            let holdings = graph.holdings.entry(user_id.to_string()).or_default();
            let edge = holdings.entry(skill.name.clone()).or_insert(HasSkill {
                level: skill.level,
                last_verified: None,
                last_tested: None,
                latest_score: None,
            });
            edge.level = skill.level;
            edge.last_verified = Some(now);

            for other in &skill.related {
                graph.merge_skill(other, None, None);
                graph.relate(&skill.name, other);
            }
        }
        Ok(())
    }

    async fn user_skills(&self, user_id: &str) -> Result<Vec<UserSkill>, GraphError> {
        let graph = self.graph.read().await;
        let Some(holdings) = graph.holdings.get(user_id) else {
            return Ok(Vec::new());
        };
        Ok(holdings
            .iter()
            .map(|(name, edge)| {
                let node = graph.skills.get(name);
                UserSkill {
                    name: name.clone(),
                    category: node.and_then(|n| n.category.clone()),
                    description: node.and_then(|n| n.description.clone()),
                    level: Some(edge.level),
                    latest_score: edge.latest_score,
                    last_verified: edge.last_verified,
                    last_tested: edge.last_tested,
                }
            })
            .collect())
    }

    async fn halo(&self, user_id: &str, limit: usize) -> Result<Vec<HaloSkill>, GraphError> {
        let graph = self.graph.read().await;
        let Some(holdings) = graph.holdings.get(user_id) else {
            return Ok(Vec::new());
        };
        let mut halo: BTreeMap<&str, &str> = BTreeMap::new();
        for held in holdings.keys() {
            for other in graph.neighbours(held) {
                if holdings.contains_key(other) {
                    continue;
                }
                let via = halo.entry(other).or_insert(held.as_str());
                if held.as_str() < *via {
                    *via = held.as_str();
                }
            }
        }
        Ok(halo
            .into_iter()
            .take(limit)
            .map(|(name, via)| HaloSkill {
                name: name.to_string(),
                via: via.to_string(),
            })
            .collect())
    }

    async fn apply_mastery(&self, user_id: &str, updates: &[MasteryUpdate]) -> Result<usize, GraphError> {
        let mut graph = self.graph.write().await;
        let Some(holdings) = graph.holdings.get_mut(user_id) else {
            return Ok(0);
        };
        let now = Utc::now();
        let mut touched = 0;
        for update in updates {
            if let Some(edge) = holdings.get_mut(&update.name) {
                edge.level = update.level;
                edge.latest_score = Some(update.score);
                edge.last_tested = Some(now);
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(name: &str, level: Proficiency, related: &[&str]) -> ExtractedSkill {
        ExtractedSkill {
            name: name.into(),
            category: "Backend".into(),
            level,
            description: String::new(),
            related: related.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn upsert_is_a_merge() {
        let store = MemoryGraphStore::new();
        store
            .upsert_skills("u1", &[skill("Go", Proficiency::Beginner, &["gRPC"])])
            .await
            .unwrap();
        store
            .upsert_skills("u1", &[skill("Go", Proficiency::Expert, &["gRPC", "Go"])])
            .await
            .unwrap();

        let skills = store.user_skills("u1").await.unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].level, Some(Proficiency::Expert));
        assert!(skills[0].last_verified.is_some());

        let halo = store.halo("u1", 8).await.unwrap();
        assert_eq!(halo, vec![HaloSkill { name: "gRPC".into(), via: "Go".into() }]);
    }

    #[tokio::test]
    async fn halo_excludes_held_skills_and_respects_limit() {
        let store = MemoryGraphStore::new();
        store
            .upsert_skills(
                "u1",
                &[
                    skill("Rust", Proficiency::Expert, &["Tokio", "Go", "WebAssembly"]),
                    skill("Go", Proficiency::Intermediate, &["Kubernetes"]),
                ],
            )
            .await
            .unwrap();

        let names: Vec<String> = store
            .halo("u1", 2)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, vec!["Kubernetes", "Tokio"]);
        assert!(store.halo("nobody", 8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mastery_only_touches_existing_edges() {
        let store = MemoryGraphStore::new();
        store
            .upsert_skills("u1", &[skill("SQL", Proficiency::Intermediate, &[])])
            .await
            .unwrap();

        let touched = store
            .apply_mastery(
                "u1",
                &[MasteryUpdate::new("SQL", 85), MasteryUpdate::new("Haskell", 10)],
            )
            .await
            .unwrap();
        assert_eq!(touched, 1);

        let skills = store.user_skills("u1").await.unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].level, Some(Proficiency::Expert));
        assert_eq!(skills[0].latest_score, Some(85));
        assert!(skills[0].last_tested.is_some());
    }
}
