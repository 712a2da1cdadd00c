use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::embedding::{EmbeddingConfig, EmbeddingService, ModelType};
use crate::search::SearchEngine;
use crate::storage::SurrealStorage;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub model: ModelType,
    pub cache_size: usize,
    pub batch_size: usize,
    /// Per-search deadline; 0 disables it.
    pub timeout_ms: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            model: ModelType::default(),
            cache_size: 1000,
            batch_size: 32,
            timeout_ms: 30000,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            model: self.model,
            cache_size: self.cache_size,
            batch_size: self.batch_size,
            cache_dir: Some(self.data_dir.join("models")),
        }
    }

    pub fn search_timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("graph-recall")
}

pub struct AppState {
    pub config: AppConfig,
    pub storage: Arc<SurrealStorage>,
    pub embedding: Arc<EmbeddingService>,
}

impl AppState {
    /// Open storage, reconcile the vector index with the configured model,
    /// and start loading the embedding model in the background.
    pub async fn open(config: AppConfig) -> crate::Result<Self> {
        let dimensions = config.model.dimensions();
        let storage = Arc::new(SurrealStorage::new(&config.data_dir, dimensions).await?);
        storage.check_dimension(dimensions).await?;

        let embedding = Arc::new(EmbeddingService::new(config.embedding_config()));
        embedding.start_loading();

        Ok(Self {
            config,
            storage,
            embedding,
        })
    }

    pub fn engine(&self) -> SearchEngine {
        SearchEngine::new(self.storage.clone(), self.embedding.clone())
            .with_timeout(self.config.search_timeout())
    }
}
