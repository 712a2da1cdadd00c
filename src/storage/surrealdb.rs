use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::engine::local::{Db, SurrealKv};
use surrealdb::Surreal;
use surrealdb_types::SurrealValue;

use super::GraphStore;
use crate::embedding::is_zero_vector;
use crate::types::{
    serialize_observations, AppError, EntityRecord, LexicalRow, RankedHit, Relation,
};
use crate::Result;

const NEAREST_SQL: &str = r#"
    SELECT name, entity_type,
        vector::similarity::cosine(embedding, $vec) AS score
    FROM entities
    WHERE embedding IS NOT NONE
      AND valid_to IS NONE
      AND vector::magnitude(embedding) > 0
    ORDER BY score DESC
    LIMIT $limit
"#;

const NEAREST_WITH_FLOOR_SQL: &str = r#"
    SELECT name, entity_type,
        vector::similarity::cosine(embedding, $vec) AS score
    FROM entities
    WHERE embedding IS NOT NONE
      AND valid_to IS NONE
      AND vector::magnitude(embedding) > 0
      AND vector::similarity::cosine(embedding, $vec) >= $min
    ORDER BY score DESC
    LIMIT $limit
"#;

// Observations are stored as a JSON array string, so the query is matched
// against it in its JSON-escaped form.
const SUBSTRING_SQL: &str = r#"
    SELECT name, entity_type, observations
    FROM entities
    WHERE valid_to IS NONE
      AND (name CONTAINS $query OR observations CONTAINS $escaped)
    ORDER BY name ASC
"#;

const HYDRATE_SQL: &str = r#"
    SELECT meta::id(id) AS id, name, entity_type, observations, version,
        created_at, updated_at, valid_from, valid_to
    FROM entities
    WHERE name IN $names AND valid_to IS NONE;

    SELECT from_name, to_name, relation_type
    FROM relations
    WHERE from_name IN $names AND to_name IN $names AND valid_to IS NONE;
"#;

#[derive(Debug, Clone, Serialize, Deserialize, SurrealValue)]
struct HitRow {
    name: String,
    entity_type: String,
    score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, SurrealValue)]
struct LexicalCandidateRow {
    name: String,
    entity_type: String,
    observations: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, SurrealValue)]
struct EntityRow {
    id: String,
    name: String,
    entity_type: String,
    observations: Option<String>,
    version: i64,
    created_at: Option<i64>,
    updated_at: Option<i64>,
    valid_from: Option<i64>,
    valid_to: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, SurrealValue)]
struct RelationRow {
    from_name: String,
    to_name: String,
    relation_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, SurrealValue)]
struct VersionRow {
    version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, SurrealValue)]
struct NameRow {
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, SurrealValue)]
struct CountRow {
    count: i64,
}

impl From<EntityRow> for EntityRecord {
    fn from(row: EntityRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            entity_type: row.entity_type,
            observations: row.observations,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            valid_from: row.valid_from,
            valid_to: row.valid_to,
        }
    }
}

/// Result of writing an entity during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated { version: i64 },
}

/// Visible record counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub entities: usize,
    pub relations: usize,
}

pub struct SurrealStorage {
    db: Surreal<Db>,
}

impl SurrealStorage {
    pub async fn new(data_dir: &Path, model_dim: usize) -> Result<Self> {
        let db_path = data_dir.join("db");
        std::fs::create_dir_all(&db_path)?;

        let db: Surreal<Db> = Surreal::new::<SurrealKv>(db_path).await?;
        db.use_ns("graph").use_db("main").await?;

        let schema = include_str!("schema.surql").replace("{dim}", &model_dim.to_string());
        db.query(&schema).await?;

        Ok(Self { db })
    }

    pub async fn check_dimension(&self, expected: usize) -> Result<()> {
        use surrealdb_types::Value;

        let mut response = self.db.query("INFO FOR TABLE entities").await?;
        let info: Value = response.take(0)?;

        let Value::Object(info) = info else {
            return Ok(());
        };
        let Some(Value::Object(indexes)) = info.get("indexes") else {
            return Ok(());
        };
        let Some(Value::String(def)) = indexes.get("idx_entities_vec") else {
            return Ok(());
        };
        let Some(dim) = extract_dimension(&def.to_string()) else {
            return Ok(());
        };

        if dim == expected {
            tracing::info!(model = expected, db = dim, "Dimension check passed");
            return Ok(());
        }

        tracing::warn!(
            old = dim,
            new = expected,
            "Dimension mismatch detected, rebuilding vector index"
        );
        let queries = format!(
            "REMOVE INDEX IF EXISTS idx_entities_vec ON entities;
             DEFINE INDEX idx_entities_vec ON entities FIELDS embedding HNSW DIMENSION {d} DIST COSINE;
             UPDATE entities SET embedding = NONE;",
            d = expected
        );
        self.db.query(&queries).await?;
        tracing::info!("Index rebuilt, old embeddings cleared");
        Ok(())
    }

    /// Create the entity, or replace the observations of the visible entity
    /// with the same name and bump its version.
    pub async fn upsert_entity(
        &self,
        name: &str,
        entity_type: &str,
        observations: &[String],
        embedding: Option<Vec<f32>>,
    ) -> Result<UpsertOutcome> {
        if let Some(vector) = &embedding {
            if vector.iter().any(|v| !v.is_finite()) || is_zero_vector(vector) {
                return Err(AppError::InvalidInput(format!(
                    "embedding for {} must be finite and non-zero",
                    name
                )));
            }
        }

        let now = chrono::Utc::now().timestamp_millis();
        let serialized = serialize_observations(observations);

        let mut response = self
            .db
            .query("SELECT version FROM entities WHERE name = $name AND valid_to IS NONE LIMIT 1")
            .bind(("name", name.to_string()))
            .await?;
        let existing: Vec<VersionRow> = response.take(0)?;

        if let Some(current) = existing.first() {
            let version = current.version + 1;
            let mut response = self
                .db
                .query(
                    "UPDATE entities SET entity_type = $entity_type, observations = $observations,
                        embedding = $embedding, version = $version, updated_at = $now
                     WHERE name = $name AND valid_to IS NONE",
                )
                .bind(("name", name.to_string()))
                .bind(("entity_type", entity_type.to_string()))
                .bind(("observations", serialized))
                .bind(("embedding", embedding))
                .bind(("version", version))
                .bind(("now", now))
                .await?;
            let _: surrealdb_types::Value = response.take(0)?;
            return Ok(UpsertOutcome::Updated { version });
        }

        let mut response = self
            .db
            .query(
                "CREATE entities CONTENT {
                    name: $name,
                    entity_type: $entity_type,
                    observations: $observations,
                    embedding: $embedding,
                    version: 1,
                    created_at: $now,
                    updated_at: $now,
                    valid_from: $now
                }",
            )
            .bind(("name", name.to_string()))
            .bind(("entity_type", entity_type.to_string()))
            .bind(("observations", serialized))
            .bind(("embedding", embedding))
            .bind(("now", now))
            .await?;
        let _: surrealdb_types::Value = response.take(0)?;
        Ok(UpsertOutcome::Created)
    }

    /// Create a relation between two visible entities. Returns false when an
    /// endpoint is missing or the same visible relation already exists.
    pub async fn create_relation(&self, relation: &Relation) -> Result<bool> {
        let mut response = self
            .db
            .query(
                "SELECT name FROM entities WHERE (name = $from OR name = $to) AND valid_to IS NONE;
                 SELECT from_name FROM relations
                 WHERE from_name = $from AND to_name = $to
                   AND relation_type = $relation_type AND valid_to IS NONE;",
            )
            .bind(("from", relation.from.clone()))
            .bind(("to", relation.to.clone()))
            .bind(("relation_type", relation.relation_type.clone()))
            .await?;
        let endpoints: Vec<NameRow> = response.take(0)?;
        let duplicates: Vec<RelationEndpointRow> = response.take(1)?;

        let found: HashSet<&str> = endpoints.iter().map(|r| r.name.as_str()).collect();
        if !found.contains(relation.from.as_str()) || !found.contains(relation.to.as_str()) {
            tracing::debug!(from = %relation.from, to = %relation.to, "Relation endpoint missing");
            return Ok(false);
        }
        if !duplicates.is_empty() {
            return Ok(false);
        }

        let now = chrono::Utc::now().timestamp_millis();
        let mut response = self
            .db
            .query(
                "CREATE relations CONTENT {
                    from_name: $from,
                    to_name: $to,
                    relation_type: $relation_type,
                    created_at: $now,
                    valid_from: $now
                }",
            )
            .bind(("from", relation.from.clone()))
            .bind(("to", relation.to.clone()))
            .bind(("relation_type", relation.relation_type.clone()))
            .bind(("now", now))
            .await?;
        let _: surrealdb_types::Value = response.take(0)?;
        Ok(true)
    }

    /// Close the validity window of an entity and of its relations.
    pub async fn invalidate_entity(&self, name: &str) -> Result<bool> {
        let mut response = self
            .db
            .query("SELECT name FROM entities WHERE name = $name AND valid_to IS NONE")
            .bind(("name", name.to_string()))
            .await?;
        let existing: Vec<NameRow> = response.take(0)?;
        if existing.is_empty() {
            return Ok(false);
        }

        let now = chrono::Utc::now().timestamp_millis();
        let mut response = self
            .db
            .query(
                "UPDATE entities SET valid_to = $now WHERE name = $name AND valid_to IS NONE;
                 UPDATE relations SET valid_to = $now
                 WHERE (from_name = $name OR to_name = $name) AND valid_to IS NONE;",
            )
            .bind(("name", name.to_string()))
            .bind(("now", now))
            .await?;
        let _: surrealdb_types::Value = response.take(0)?;
        let _: surrealdb_types::Value = response.take(1)?;
        Ok(true)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let mut response = self
            .db
            .query(
                "SELECT count() AS count FROM entities WHERE valid_to IS NONE GROUP ALL;
                 SELECT count() AS count FROM relations WHERE valid_to IS NONE GROUP ALL;",
            )
            .await?;
        let entities: Vec<CountRow> = response.take(0)?;
        let relations: Vec<CountRow> = response.take(1)?;

        let count = |rows: &[CountRow]| rows.first().map(|r| r.count.max(0) as usize).unwrap_or(0);
        Ok(StoreStats {
            entities: count(&entities),
            relations: count(&relations),
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        // Touch both tables so pending writes are committed to disk.
        self.db
            .query(
                "SELECT count() AS c FROM entities GROUP ALL;
                 SELECT count() AS c FROM relations GROUP ALL;",
            )
            .await?;
        tracing::info!("Storage flushed successfully");
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, SurrealValue)]
struct RelationEndpointRow {
    from_name: String,
}

fn extract_dimension(def: &str) -> Option<usize> {
    def.split("DIMENSION ")
        .nth(1)?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// The query as it appears inside a JSON-encoded string. JSON escaping is
/// per character, so a raw substring of an observation stays a substring
/// of the serialized observation list.
fn json_escaped_fragment(query: &str) -> String {
    let quoted = serde_json::to_string(query).unwrap_or_default();
    quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(query)
        .to_string()
}

#[async_trait]
impl GraphStore for SurrealStorage {
    async fn nearest_entities(
        &self,
        embedding: &[f32],
        limit: usize,
        min_similarity: Option<f32>,
    ) -> Result<Vec<RankedHit>> {
        let mut response = match min_similarity {
            Some(min) => {
                self.db
                    .query(NEAREST_WITH_FLOOR_SQL)
                    .bind(("vec", embedding.to_vec()))
                    .bind(("min", min))
                    .bind(("limit", limit))
                    .await?
            }
            None => {
                self.db
                    .query(NEAREST_SQL)
                    .bind(("vec", embedding.to_vec()))
                    .bind(("limit", limit))
                    .await?
            }
        };
        let rows: Vec<HitRow> = response.take(0)?;
        let total = rows.len();
        let hits: Vec<RankedHit> = rows
            .into_iter()
            .filter(|r| !r.score.is_nan())
            .map(|r| RankedHit::new(r.name, r.entity_type, r.score))
            .collect();
        if hits.len() < total {
            tracing::warn!(skipped = total - hits.len(), "Skipped entities with undefined similarity");
        }
        Ok(hits)
    }

    async fn substring_candidates(&self, query: &str) -> Result<Vec<LexicalRow>> {
        let mut response = self
            .db
            .query(SUBSTRING_SQL)
            .bind(("query", query.to_string()))
            .bind(("escaped", json_escaped_fragment(query)))
            .await?;
        let rows: Vec<LexicalCandidateRow> = response.take(0)?;
        Ok(rows
            .into_iter()
            .map(|r| LexicalRow {
                name: r.name,
                entity_type: r.entity_type,
                observations: r.observations,
            })
            .collect())
    }

    async fn hydrate(&self, names: &[String]) -> Result<(Vec<EntityRecord>, Vec<Relation>)> {
        if names.is_empty() {
            return Ok((vec![], vec![]));
        }

        let mut response = self
            .db
            .query(HYDRATE_SQL)
            .bind(("names", names.to_vec()))
            .await?;
        let entities: Vec<EntityRow> = response.take(0)?;
        let relations: Vec<RelationRow> = response.take(1)?;

        Ok((
            entities.into_iter().map(EntityRecord::from).collect(),
            relations
                .into_iter()
                .map(|r| Relation::new(r.from_name, r.to_name, r.relation_type))
                .collect(),
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        self.db.query("INFO FOR DB").await?;
        Ok(true)
    }
}
