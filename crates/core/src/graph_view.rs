//! Node/link data for the 3D force-graph view.

use crate::error::GraphError;
use crate::graph_store::SkillGraphStore;
use crate::skills::Proficiency;
use serde::Serialize;
use std::collections::HashSet;

const HALO_VIEW_LIMIT: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub group: u8,
    pub val: u32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    pub color: String,
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

fn style(level: Option<Proficiency>) -> (&'static str, u32) {
    match level {
        Some(Proficiency::Expert) => ("#4ade80", 10),
        Some(Proficiency::Intermediate) => ("#facc15", 7),
        Some(Proficiency::Beginner) => ("#f87171", 5),
        None => ("#808080", 5),
    }
}

/// The user at the center, held skills around them, halo skills outside.
pub async fn user_graph(graph: &dyn SkillGraphStore, user_id: &str) -> Result<GraphView, GraphError> {
    let skills = graph.user_skills(user_id).await?;
    let halo = graph.halo(user_id, HALO_VIEW_LIMIT).await?;

    let mut view = GraphView::default();
    view.nodes.push(GraphNode {
        id: user_id.to_string(),
        name: "Me".into(),
        label: None,
        group: 0,
        val: 20,
        color: "#ffffff".into(),
    });

    let mut seen = HashSet::new();
    for skill in &skills {
        let (color, val) = style(skill.level);
        if seen.insert(skill.name.clone()) {
            view.nodes.push(GraphNode {
                id: skill.name.clone(),
                name: skill.name.clone(),
                label: Some(skill.level.map_or("Unknown", |l| l.as_str()).to_string()),
                group: 1,
                val,
                color: color.into(),
            });
        }
        view.links.push(GraphLink {
            source: user_id.to_string(),
            target: skill.name.clone(),
            color: "rgba(255,255,255,0.2)".into(),
            width: 1,
        });
    }

    for h in &halo {
        if seen.insert(h.name.clone()) {
            view.nodes.push(GraphNode {
                id: h.name.clone(),
                name: h.name.clone(),
                label: Some("Related".into()),
                group: 2,
                val: 3,
                color: "rgba(96,165,250,0.6)".into(),
            });
        }
        view.links.push(GraphLink {
            source: h.via.clone(),
            target: h.name.clone(),
            color: "rgba(96,165,250,0.25)".into(),
            width: 1,
        });
    }
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_store::MockSkillGraphStore;
    use crate::skills::{HaloSkill, UserSkill};

    fn held(name: &str, level: Option<Proficiency>) -> UserSkill {
        UserSkill {
            name: name.into(),
            category: None,
            description: None,
            level,
            latest_score: None,
            last_verified: None,
            last_tested: None,
        }
    }

    #[tokio::test]
    async fn nodes_are_colored_by_level() {
        let mut graph = MockSkillGraphStore::new();
        graph.expect_user_skills().returning(|_| {
            Ok(vec![
                held("Go", Some(Proficiency::Expert)),
                held("Rust", Some(Proficiency::Beginner)),
                held("Lua", None),
            ])
        });
        graph.expect_halo().returning(|_, _| {
            Ok(vec![HaloSkill {
                name: "Tokio".into(),
                via: "Rust".into(),
            }])
        });

        let view = user_graph(&graph, "u1").await.unwrap();
        assert_eq!(view.nodes.len(), 5);
        assert_eq!(view.nodes[0].name, "Me");
        assert_eq!(view.nodes[0].val, 20);
        assert_eq!((view.nodes[1].color.as_str(), view.nodes[1].val), ("#4ade80", 10));
        assert_eq!((view.nodes[2].color.as_str(), view.nodes[2].val), ("#f87171", 5));
        assert_eq!(view.nodes[3].label.as_deref(), Some("Unknown"));
        assert_eq!(view.nodes[4].group, 2);

        assert_eq!(view.links.len(), 4);
        assert_eq!(view.links[3].source, "Rust");
        assert_eq!(view.links[0].color, "rgba(255,255,255,0.2)");
    }

    #[tokio::test]
    async fn empty_graph_has_only_the_user() {
        let mut graph = MockSkillGraphStore::new();
        graph.expect_user_skills().returning(|_| Ok(vec![]));
        graph.expect_halo().returning(|_, _| Ok(vec![]));
        let view = user_graph(&graph, "u1").await.unwrap();
        assert_eq!(view.nodes.len(), 1);
        assert!(view.links.is_empty());
    }
}
