use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::cache::{CacheStats, EmbeddingCache};
use super::config::{EmbeddingConfig, ModelType};
use super::engine::EmbeddingEngine;
use super::{validate_batch, validate_embedding, EmbeddingProvider, EmbeddingStatus};
use crate::types::{AppError, Result};

const STATUS_LOADING: u8 = 0;
const STATUS_READY: u8 = 1;
const STATUS_ERROR: u8 = 2;

/// Embedding provider backed by a local model. Loading happens on a
/// background thread; requests before it finishes fail with
/// `EmbeddingNotReady`.
pub struct EmbeddingService {
    engine: Arc<RwLock<Option<Arc<EmbeddingEngine>>>>,
    cache: EmbeddingCache,
    config: EmbeddingConfig,
    status: Arc<AtomicU8>,
    load_error: Arc<OnceLock<String>>,
}

impl EmbeddingService {
    pub fn new(config: EmbeddingConfig) -> Self {
        let (engine, status) = if config.model == ModelType::Mock {
            let mock = EmbeddingEngine::mock(config.model.dimensions());
            (Some(Arc::new(mock)), STATUS_READY)
        } else {
            (None, STATUS_LOADING)
        };

        Self {
            engine: Arc::new(RwLock::new(engine)),
            cache: EmbeddingCache::new(config.cache_size),
            config,
            status: Arc::new(AtomicU8::new(status)),
            load_error: Arc::new(OnceLock::new()),
        }
    }

    pub fn start_loading(&self) {
        if self.status.load(Ordering::Acquire) != STATUS_LOADING {
            return;
        }

        let engine_state = self.engine.clone();
        let status = self.status.clone();
        let load_error = self.load_error.clone();
        let config = self.config.clone();

        std::thread::spawn(move || {
            tracing::info!(model = %config.model, "Loading embedding model");

            match EmbeddingEngine::new(&config) {
                Ok(engine) => {
                    *engine_state.blocking_write() = Some(Arc::new(engine));
                    status.store(STATUS_READY, Ordering::Release);
                    tracing::info!(model = %config.model, "Embedding model ready");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load embedding model");
                    let _ = load_error.set(e.to_string());
                    status.store(STATUS_ERROR, Ordering::Release);
                }
            }
        });
    }

    pub fn status(&self) -> EmbeddingStatus {
        match self.status.load(Ordering::Acquire) {
            STATUS_LOADING => EmbeddingStatus::Loading,
            STATUS_READY => EmbeddingStatus::Ready,
            _ => EmbeddingStatus::Error {
                message: self
                    .load_error
                    .get()
                    .cloned()
                    .unwrap_or_else(|| "unknown error".to_string()),
            },
        }
    }

    /// Poll until the model is ready, failed to load, or `timeout` elapses.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.status() {
                EmbeddingStatus::Ready => return Ok(()),
                EmbeddingStatus::Error { message } => return Err(AppError::Embedding(message)),
                EmbeddingStatus::Loading => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AppError::EmbeddingNotReady);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub fn model(&self) -> ModelType {
        self.config.model
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn engine(&self) -> Result<Arc<EmbeddingEngine>> {
        self.engine
            .read()
            .await
            .clone()
            .ok_or(AppError::EmbeddingNotReady)
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model_ver = self.config.model.repo_id();
        if let Some(cached) = self.cache.get(text, model_ver) {
            return Ok(cached);
        }

        let engine = self.engine().await?;
        let owned = text.to_string();
        let embedding = tokio::task::spawn_blocking(move || engine.embed(&owned))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map_err(|e| AppError::Embedding(e.to_string()))?;

        validate_embedding(&embedding, self.dimensions())?;
        self.cache.put(text, model_ver, embedding.clone());
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let engine = self.engine().await?;
        let batch_size = self.config.batch_size.max(1);
        let mut embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(batch_size) {
            let chunk_engine = engine.clone();
            let owned = chunk.to_vec();
            let vectors = tokio::task::spawn_blocking(move || chunk_engine.embed_batch(&owned))
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?
                .map_err(|e| AppError::Embedding(e.to_string()))?;

            validate_batch(&vectors, chunk.len(), self.dimensions())?;
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.config.model.dimensions()
    }
}
