//! Neo4j over its HTTP transactional endpoint.

use crate::error::GraphError;
use crate::graph_store::SkillGraphStore;
use crate::skills::{ExtractedSkill, HaloSkill, MasteryUpdate, Proficiency, UserSkill};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

const UPSERT_SKILLS: &str = "
MERGE (u:User {uid: $userId})
WITH u
UNWIND $skills AS skill
MERGE (s:Skill {name: skill.name})
ON CREATE SET s.category = skill.category, s.created_at = datetime()
SET s.description = CASE WHEN skill.description <> '' THEN skill.description ELSE s.description END
MERGE (u)-[r:HAS_SKILL]->(s)
SET r.level = skill.level, r.last_verified = datetime()
WITH s, skill
UNWIND skill.related AS relatedName
WITH s, relatedName
WHERE relatedName <> s.name
MERGE (o:Skill {name: relatedName})
ON CREATE SET o.created_at = datetime()
MERGE (s)-[:RELATED_TO]-(o)";

const USER_SKILLS: &str = "
MATCH (u:User {uid: $userId})-[r:HAS_SKILL]->(s:Skill)
RETURN s.name, s.category, s.description, r.level, r.latest_score,
       toString(r.last_verified), toString(r.last_tested)
ORDER BY s.name";

const HALO: &str = "
MATCH (u:User {uid: $userId})-[:HAS_SKILL]->(s:Skill)-[:RELATED_TO]-(h:Skill)
WHERE NOT (u)-[:HAS_SKILL]->(h)
RETURN h.name AS name, min(s.name) AS via
ORDER BY name
LIMIT $limit";

const APPLY_MASTERY: &str = "
UNWIND $updates AS update
MATCH (u:User {uid: $userId})-[r:HAS_SKILL]->(s:Skill {name: update.name})
SET r.last_tested = datetime(), r.latest_score = update.score, r.level = update.level
RETURN count(r)";

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

/// Maps driver-style schemes onto the HTTP endpoint of the same host.
fn http_base(uri: &str) -> String {
    let uri = uri.trim_end_matches('/');
    for (scheme, replacement) in [("neo4j+s://", "https://"), ("bolt+s://", "https://")] {
        if let Some(host) = uri.strip_prefix(scheme) {
            return format!("{replacement}{host}");
        }
    }
    uri.to_string()
}

/// Runs parameterized Cypher statements, one auto-committed transaction each.
pub struct CypherClient {
    client: Client,
    endpoint: String,
    username: String,
    password: SecretString,
}

impl CypherClient {
    pub fn new(uri: &str, database: &str, username: &str, password: SecretString) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/db/{}/tx/commit", http_base(uri), database),
            username: username.to_string(),
            password,
        }
    }

    /// Returns the rows of the statement's single result.
    pub async fn run(&self, statement: &str, parameters: Value) -> Result<Vec<Vec<Value>>, GraphError> {
        let body = json!({
            "statements": [{ "statement": statement, "parameters": parameters }]
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        let parsed: TxResponse = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                GraphError::Decode(e.to_string())
            } else {
                GraphError::Decode(format!("status {status}"))
            }
        })?;

        if let Some(err) = parsed.errors.into_iter().next() {
            tracing::error!("Cypher statement failed: {} {}", err.code, err.message);
            return Err(GraphError::Query {
                code: err.code,
                message: err.message,
            });
        }
        if !status.is_success() {
            return Err(GraphError::Decode(format!("status {status}")));
        }

        Ok(parsed
            .results
            .into_iter()
            .next()
            .map(|r| r.data.into_iter().map(|d| d.row).collect())
            .unwrap_or_default())
    }
}

pub struct Neo4jGraphStore {
    cypher: CypherClient,
}

impl Neo4jGraphStore {
    pub fn new(cypher: CypherClient) -> Self {
        Self { cypher }
    }
}

fn text(v: &Value) -> Option<String> {
    v.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

fn timestamp(v: &Value) -> Option<DateTime<Utc>> {
    v.as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn user_skill(row: &[Value]) -> Option<UserSkill> {
    let cell = |i: usize| row.get(i).unwrap_or(&Value::Null);
    Some(UserSkill {
        name: text(cell(0))?,
        category: text(cell(1)),
        description: text(cell(2)),
        level: cell(3).as_str().map(Proficiency::parse_lenient),
        latest_score: cell(4).as_i64(),
        last_verified: timestamp(cell(5)),
        last_tested: timestamp(cell(6)),
    })
}

#[async_trait]
impl SkillGraphStore for Neo4jGraphStore {
    async fn upsert_skills(&self, user_id: &str, skills: &[ExtractedSkill]) -> Result<(), GraphError> {
        let params = json!({ "userId": user_id, "skills": skills });
        self.cypher.run(UPSERT_SKILLS, params).await?;
        tracing::info!("Graph synced: {} skills for user {}", skills.len(), user_id);
        Ok(())
    }

    async fn user_skills(&self, user_id: &str) -> Result<Vec<UserSkill>, GraphError> {
        let rows = self.cypher.run(USER_SKILLS, json!({ "userId": user_id })).await?;
        Ok(rows.iter().map(Vec::as_slice).filter_map(user_skill).collect())
    }

    async fn halo(&self, user_id: &str, limit: usize) -> Result<Vec<HaloSkill>, GraphError> {
        let rows = self
            .cypher
            .run(HALO, json!({ "userId": user_id, "limit": limit }))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                Some(HaloSkill {
                    name: text(r.first()?)?,
                    via: text(r.get(1)?)?,
                })
            })
            .collect())
    }

    async fn apply_mastery(&self, user_id: &str, updates: &[MasteryUpdate]) -> Result<usize, GraphError> {
        if updates.is_empty() {
            return Ok(0);
        }
        let params = json!({ "userId": user_id, "updates": updates });
        let rows = self.cypher.run(APPLY_MASTERY, params).await?;
        let touched = rows
            .first()
            .and_then(|r| r.first())
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        tracing::info!("Graph mastery levels updated for {} skill(s)", touched);
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{basic_auth, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> Neo4jGraphStore {
        Neo4jGraphStore::new(CypherClient::new(
            &server.uri(),
            "neo4j",
            "neo4j",
            SecretString::from("pw".to_string()),
        ))
    }

    #[test]
    fn aura_scheme_maps_to_https() {
        assert_eq!(http_base("neo4j+s://abc.databases.neo4j.io/"), "https://abc.databases.neo4j.io");
        assert_eq!(http_base("http://localhost:7474"), "http://localhost:7474");
    }

    #[tokio::test]
    async fn user_skills_are_read_from_rows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/db/neo4j/tx/commit"))
            .and(basic_auth("neo4j", "pw"))
            .and(body_partial_json(json!({
                "statements": [{ "parameters": { "userId": "u1" } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "columns": ["s.name"],
                    "data": [
                        { "row": ["Go", "Language", null, "Expert", 91, "2025-01-02T03:04:05Z", null] },
                        { "row": ["SQL", "Database", "Queries", "guru", null, null, null] }
                    ]
                }],
                "errors": []
            })))
            .mount(&server)
            .await;

        let skills = store(&server).user_skills("u1").await.unwrap();
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0].level, Some(Proficiency::Expert));
        assert_eq!(skills[0].latest_score, Some(91));
        assert!(skills[0].last_verified.is_some());
        assert_eq!(skills[1].description.as_deref(), Some("Queries"));
        assert_eq!(skills[1].level, Some(Proficiency::Intermediate));
    }

    #[tokio::test]
    async fn cypher_errors_surface_as_query_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [],
                "errors": [{ "code": "Neo.ClientError.Statement.SyntaxError", "message": "bad" }]
            })))
            .mount(&server)
            .await;

        let err = store(&server).halo("u1", 8).await.unwrap_err();
        assert!(matches!(err, GraphError::Query { ref code, .. } if code.ends_with("SyntaxError")));
    }

    #[tokio::test]
    async fn mastery_update_returns_touched_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "statements": [{ "parameters": { "updates": [{ "name": "Go", "score": 45, "level": "Intermediate" }] } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "columns": ["count(r)"], "data": [{ "row": [1] }] }],
                "errors": []
            })))
            .mount(&server)
            .await;

        let touched = store(&server)
            .apply_mastery("u1", &[MasteryUpdate::new("Go", 45)])
            .await
            .unwrap();
        assert_eq!(touched, 1);
    }

    #[tokio::test]
    async fn empty_mastery_skips_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        assert_eq!(store(&server).apply_mastery("u1", &[]).await.unwrap(), 0);
    }
}
