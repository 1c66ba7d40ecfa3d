use crate::error::GraphError;
use crate::graph_store::SkillGraphStore;
use crate::skills::Proficiency;
use serde::Serialize;

/// Halo skills mentioned in the interviewer's profile.
pub const PROFILE_HALO_LIMIT: usize = 8;

/// A user's skills grouped for the interviewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphContext {
    pub weak_skills: Vec<String>,
    pub intermediate_skills: Vec<String>,
    pub expert_skills: Vec<String>,
    pub adjacent_skills: Vec<String>,
    /// Ready to append to the system instruction.
    pub summary: String,
}

/// Builds the personalization block for `user_id`; `None` when the user has
/// no skills yet.
pub async fn graph_context(
    graph: &dyn SkillGraphStore,
    user_id: &str,
) -> Result<Option<GraphContext>, GraphError> {
    let skills = graph.user_skills(user_id).await?;
    if skills.is_empty() {
        return Ok(None);
    }

    let names = |level: Proficiency| -> Vec<String> {
        skills
            .iter()
            .filter(|s| s.level == Some(level))
            .map(|s| s.name.clone())
            .collect()
    };
    let weak = names(Proficiency::Beginner);
    let mid = names(Proficiency::Intermediate);
    let strong = names(Proficiency::Expert);
    let adjacent: Vec<String> = graph
        .halo(user_id, PROFILE_HALO_LIMIT)
        .await?
        .into_iter()
        .map(|h| h.name)
        .collect();

    let mut summary = String::from("Candidate Profile based on Knowledge Graph:\n");
    if !strong.is_empty() {
        summary.push_str(&format!("[Strengths]: {}. (Expect deep mastery here).\n", strong.join(", ")));
    }
    if !mid.is_empty() {
        summary.push_str(&format!(
            "[Growth Areas]: {}. (Good targets for challenging questions).\n",
            mid.join(", ")
        ));
    }
    if !weak.is_empty() {
        summary.push_str(&format!(
            "[Weak/New]: {}. (Start with basics, verify understanding).\n",
            weak.join(", ")
        ));
    }
    if !adjacent.is_empty() {
        summary.push_str(&format!(
            "[Adjacent Topics]: {}. (Related to their stack; probe for transferable knowledge).\n",
            adjacent.join(", ")
        ));
    }

    Ok(Some(GraphContext {
        weak_skills: weak,
        intermediate_skills: mid,
        expert_skills: strong,
        adjacent_skills: adjacent,
        summary,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_store::{MemoryGraphStore, MockSkillGraphStore};
    use crate::skills::ExtractedSkill;

    fn skill(name: &str, level: Proficiency, related: &[&str]) -> ExtractedSkill {
        ExtractedSkill {
            name: name.into(),
            category: String::new(),
            level,
            description: String::new(),
            related: related.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn skills_are_grouped_by_level() {
        let graph = MemoryGraphStore::new();
        graph
            .upsert_skills(
                "u1",
                &[
                    skill("Go", Proficiency::Expert, &["gRPC"]),
                    skill("Kafka", Proficiency::Beginner, &[]),
                    skill("SQL", Proficiency::Intermediate, &[]),
                ],
            )
            .await
            .unwrap();

        let ctx = graph_context(&graph, "u1").await.unwrap().unwrap();
        assert_eq!(ctx.expert_skills, vec!["Go"]);
        assert_eq!(ctx.weak_skills, vec!["Kafka"]);
        assert_eq!(ctx.adjacent_skills, vec!["gRPC"]);
        assert!(ctx.summary.starts_with("Candidate Profile based on Knowledge Graph:\n[Strengths]: Go."));
        assert!(ctx.summary.contains("[Growth Areas]: SQL."));
        assert!(ctx.summary.contains("[Weak/New]: Kafka."));
    }

    #[tokio::test]
    async fn no_skills_means_no_context() {
        let mut graph = MockSkillGraphStore::new();
        graph.expect_user_skills().returning(|_| Ok(vec![]));
        graph.expect_halo().never();
        assert_eq!(graph_context(&graph, "u1").await.unwrap(), None);
    }
}
