mod cache;
mod config;
mod engine;
mod service;

use async_trait::async_trait;

pub use cache::{CacheStats, EmbeddingCache};
pub use config::{EmbeddingConfig, ModelType};
pub use engine::EmbeddingEngine;
pub use service::EmbeddingService;

use crate::types::{AppError, Result};

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// One vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EmbeddingStatus {
    Loading,
    Ready,
    Error { message: String },
}

impl EmbeddingStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Reject a provider payload that is empty, of the wrong dimension,
/// contains non-finite values, or has zero length (cosine is undefined).
pub fn validate_embedding(embedding: &[f32], dimensions: usize) -> Result<()> {
    if embedding.is_empty() {
        return Err(AppError::Embedding("empty embedding payload".to_string()));
    }
    if embedding.len() != dimensions {
        return Err(AppError::Embedding(format!(
            "expected {} dimensions, got {}",
            dimensions,
            embedding.len()
        )));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(AppError::Embedding(
            "embedding contains non-finite values".to_string(),
        ));
    }
    if is_zero_vector(embedding) {
        return Err(AppError::Embedding("embedding has zero length".to_string()));
    }
    Ok(())
}

/// True when every component is zero, so the vector has no direction.
pub fn is_zero_vector(embedding: &[f32]) -> bool {
    embedding.iter().all(|v| *v == 0.0)
}

pub fn validate_batch(embeddings: &[Vec<f32>], expected: usize, dimensions: usize) -> Result<()> {
    if embeddings.len() != expected {
        return Err(AppError::Embedding(format!(
            "expected {} embeddings, got {}",
            expected,
            embeddings.len()
        )));
    }
    embeddings
        .iter()
        .try_for_each(|e| validate_embedding(e, dimensions))
}
