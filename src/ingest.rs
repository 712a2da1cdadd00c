use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::storage::{SurrealStorage, UpsertOutcome};
use crate::types::{AppError, Relation, Result};

fn default_entity_type() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityInput {
    pub name: String,
    #[serde(default = "default_entity_type")]
    pub entity_type: String,
    #[serde(default)]
    pub observations: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub entities: Vec<EntityInput>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl GraphDocument {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub created: usize,
    pub updated: usize,
    pub relations_created: usize,
    pub relations_skipped: usize,
}

/// Text an entity is embedded from.
pub fn embedding_text(entity: &EntityInput) -> String {
    let mut parts = Vec::with_capacity(entity.observations.len() + 2);
    parts.push(entity.name.as_str());
    parts.push(entity.entity_type.as_str());
    parts.extend(entity.observations.iter().map(String::as_str));
    parts.join(". ")
}

/// Embed and upsert every entity, then create the relations whose
/// endpoints exist.
pub async fn ingest(
    storage: &SurrealStorage,
    embedder: &dyn EmbeddingProvider,
    document: &GraphDocument,
    batch_size: usize,
) -> Result<IngestReport> {
    if let Some(entity) = document.entities.iter().find(|e| e.name.trim().is_empty()) {
        return Err(AppError::InvalidInput(format!(
            "entity name must not be empty (type {})",
            entity.entity_type
        )));
    }

    let mut report = IngestReport::default();

    for chunk in document.entities.chunks(batch_size.max(1)) {
        let texts: Vec<String> = chunk.iter().map(embedding_text).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunk.len() {
            return Err(AppError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunk.len(),
                embeddings.len()
            )));
        }

        for (entity, embedding) in chunk.iter().zip(embeddings) {
            let outcome = storage
                .upsert_entity(
                    &entity.name,
                    &entity.entity_type,
                    &entity.observations,
                    Some(embedding),
                )
                .await?;
            match outcome {
                UpsertOutcome::Created => report.created += 1,
                UpsertOutcome::Updated { version } => {
                    tracing::debug!(entity = %entity.name, version, "Entity updated");
                    report.updated += 1;
                }
            }
        }
    }

    for relation in &document.relations {
        if storage.create_relation(relation).await? {
            report.relations_created += 1;
        } else {
            report.relations_skipped += 1;
        }
    }

    tracing::info!(
        created = report.created,
        updated = report.updated,
        relations_created = report.relations_created,
        relations_skipped = report.relations_skipped,
        "Ingestion complete"
    );
    Ok(report)
}
