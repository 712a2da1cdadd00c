use std::sync::Arc;

use crate::embedding::is_zero_vector;
use crate::storage::GraphStore;
use crate::types::{AppError, RankedHit, Result};

/// Nearest-neighbour candidates from the store's embedding index.
pub struct VectorRanker {
    store: Arc<dyn GraphStore>,
}

impl VectorRanker {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Up to `max_candidates` hits, best first. `floor` is only passed in
    /// vector-only mode.
    pub async fn rank(
        &self,
        embedding: &[f32],
        max_candidates: usize,
        floor: Option<f32>,
    ) -> Result<Vec<RankedHit>> {
        if max_candidates == 0 {
            return Ok(vec![]);
        }
        if is_zero_vector(embedding) {
            return Err(AppError::InvalidInput(
                "query vector has zero length".to_string(),
            ));
        }

        let hits = self
            .store
            .nearest_entities(embedding, max_candidates, floor)
            .await?;
        check_contract(&hits, max_candidates, floor)?;

        tracing::debug!(
            candidates = hits.len(),
            max_candidates,
            floor = ?floor,
            "Vector ranking complete"
        );
        Ok(hits)
    }
}

fn check_contract(hits: &[RankedHit], max_candidates: usize, floor: Option<f32>) -> Result<()> {
    if hits.len() > max_candidates {
        return Err(AppError::Database(format!(
            "vector index returned {} hits, requested at most {}",
            hits.len(),
            max_candidates
        )));
    }
    if let Some(pair) = hits.windows(2).find(|w| w[0].score < w[1].score) {
        return Err(AppError::Database(format!(
            "vector index results out of order: {} ({}) before {} ({})",
            pair[0].id, pair[0].score, pair[1].id, pair[1].score
        )));
    }
    if hits.iter().any(|h| h.score.is_nan()) {
        return Err(AppError::Database(
            "vector index returned a NaN similarity".to_string(),
        ));
    }
    if let Some(min) = floor {
        if let Some(hit) = hits.iter().find(|h| h.score < f64::from(min)) {
            return Err(AppError::Database(format!(
                "vector index returned {} at {} below floor {}",
                hit.id, hit.score, min
            )));
        }
    }
    Ok(())
}
