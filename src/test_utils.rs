use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::config::{AppConfig, AppState};
use crate::embedding::{EmbeddingConfig, EmbeddingProvider, EmbeddingService, ModelType};
use crate::storage::{GraphStore, SurrealStorage};
use crate::types::{
    serialize_observations, AppError, EntityRecord, LexicalRow, RankedHit, Relation, Result,
};

pub const TEST_DIM: usize = 4;

/// Scripted in-memory store. Every capability returns what the test set
/// up and records how it was called.
#[derive(Default)]
pub struct MockStore {
    vector_hits: Vec<RankedHit>,
    lexical_rows: Vec<LexicalRow>,
    entities: Vec<EntityRecord>,
    relations: Vec<Relation>,
    vector_error: Option<String>,
    lexical_error: Option<String>,
    hydrate_error: Option<String>,
    delay: Option<Duration>,
    vector_calls: AtomicUsize,
    lexical_calls: AtomicUsize,
    hydrate_calls: AtomicUsize,
    last_vector: Mutex<Option<(usize, Option<f32>)>>,
    last_hydrate: Mutex<Option<Vec<String>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lexical_row(name: &str, observations: &[&str]) -> LexicalRow {
        let owned: Vec<String> = observations.iter().map(|s| s.to_string()).collect();
        LexicalRow {
            name: name.to_string(),
            entity_type: "team".to_string(),
            observations: Some(serialize_observations(&owned)),
        }
    }

    pub fn with_vector_hits(mut self, hits: Vec<RankedHit>) -> Self {
        self.vector_hits = hits;
        self
    }

    pub fn with_lexical_rows(mut self, rows: Vec<LexicalRow>) -> Self {
        self.lexical_rows = rows;
        self
    }

    pub fn with_entity(mut self, record: EntityRecord) -> Self {
        self.entities.push(record);
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn failing_vector(mut self, message: &str) -> Self {
        self.vector_error = Some(message.to_string());
        self
    }

    pub fn failing_lexical(mut self, message: &str) -> Self {
        self.lexical_error = Some(message.to_string());
        self
    }

    pub fn failing_hydrate(mut self, message: &str) -> Self {
        self.hydrate_error = Some(message.to_string());
        self
    }

    /// Every capability sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn vector_calls(&self) -> usize {
        self.vector_calls.load(Ordering::SeqCst)
    }

    pub fn lexical_calls(&self) -> usize {
        self.lexical_calls.load(Ordering::SeqCst)
    }

    pub fn hydrate_calls(&self) -> usize {
        self.hydrate_calls.load(Ordering::SeqCst)
    }

    pub fn last_vector_request(&self) -> Option<(usize, Option<f32>)> {
        *self.last_vector.lock().unwrap()
    }

    pub fn last_hydrate_request(&self) -> Option<Vec<String>> {
        self.last_hydrate.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn scripted_failure(error: &Option<String>) -> Result<()> {
    match error {
        Some(message) => Err(AppError::Database(message.clone())),
        None => Ok(()),
    }
}

#[async_trait]
impl GraphStore for MockStore {
    async fn nearest_entities(
        &self,
        _embedding: &[f32],
        limit: usize,
        min_similarity: Option<f32>,
    ) -> Result<Vec<RankedHit>> {
        self.vector_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_vector.lock().unwrap() = Some((limit, min_similarity));
        self.pause().await;
        scripted_failure(&self.vector_error)?;

        Ok(self
            .vector_hits
            .iter()
            .filter(|h| min_similarity.is_none_or(|min| h.score >= f64::from(min)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn substring_candidates(&self, _query: &str) -> Result<Vec<LexicalRow>> {
        self.lexical_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        scripted_failure(&self.lexical_error)?;
        Ok(self.lexical_rows.clone())
    }

    async fn hydrate(&self, names: &[String]) -> Result<(Vec<EntityRecord>, Vec<Relation>)> {
        self.hydrate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_hydrate.lock().unwrap() = Some(names.to_vec());
        self.pause().await;
        scripted_failure(&self.hydrate_error)?;

        let entities = self
            .entities
            .iter()
            .filter(|e| e.is_visible() && names.contains(&e.name))
            .cloned()
            .collect();
        let relations = self
            .relations
            .iter()
            .filter(|r| names.contains(&r.from) && names.contains(&r.to))
            .cloned()
            .collect();
        Ok((entities, relations))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Returns the same unit-ish vector for every text.
pub struct StaticEmbedder {
    dimensions: usize,
}

impl StaticEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0; self.dimensions])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0; self.dimensions]).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AppError::Embedding("provider unavailable".to_string()))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(AppError::Embedding("provider unavailable".to_string()))
    }

    fn dimensions(&self) -> usize {
        TEST_DIM
    }
}

/// On-disk SurrealKV store plus the mock embedding model.
pub struct TestContext {
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir, // Kept to ensure directory lives as long as context
}

impl TestContext {
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path();

        let embedding_config = EmbeddingConfig {
            model: ModelType::Mock,
            cache_size: 100,
            batch_size: 2,
            cache_dir: None,
        };
        let dim = embedding_config.model.dimensions();

        let storage = Arc::new(
            SurrealStorage::new(db_path, dim)
                .await
                .expect("Failed to init storage"),
        );
        let embedding = Arc::new(EmbeddingService::new(embedding_config));
        embedding
            .wait_ready(Duration::from_secs(1))
            .await
            .expect("Mock embedding service failed to start");

        let config = AppConfig {
            data_dir: db_path.to_path_buf(),
            model: ModelType::Mock,
            cache_size: 100,
            batch_size: 2,
            timeout_ms: 5000,
            log_level: "debug".to_string(),
        };

        let state = Arc::new(AppState {
            config,
            storage,
            embedding,
        });

        Self {
            state,
            _temp_dir: temp_dir,
        }
    }
}
