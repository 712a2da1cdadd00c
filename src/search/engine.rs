use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{LexicalRanker, ResultHydrator, VectorRanker};
use crate::embedding::{is_zero_vector, EmbeddingProvider};
use crate::graph::rrf_fuse;
use crate::storage::GraphStore;
use crate::types::{
    normalize_limit, AppError, Candidate, HybridSearchOptions, Result, SearchResult,
    VectorSearchOptions,
};

/// Each ranker fetches this many candidates per requested result.
const CANDIDATE_MULTIPLIER: usize = 2;

/// Runs the search pipeline: rank, fuse, hydrate.
pub struct SearchEngine {
    vector: VectorRanker,
    lexical: LexicalRanker,
    hydrator: ResultHydrator,
    embedder: Arc<dyn EmbeddingProvider>,
    timeout: Option<Duration>,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn GraphStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            vector: VectorRanker::new(store.clone()),
            lexical: LexicalRanker::new(store.clone()),
            hydrator: ResultHydrator::new(store),
            embedder,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Hybrid search from query text.
    pub async fn search(&self, text: &str, opts: &HybridSearchOptions) -> Result<SearchResult> {
        let start = Instant::now();
        self.with_deadline(async {
            let embedding = self.embedder.embed(text).await?;
            self.run_hybrid(&embedding, text, opts, start).await
        })
        .await
    }

    /// Vector-only search from query text.
    pub async fn semantic_search(
        &self,
        text: &str,
        opts: &VectorSearchOptions,
    ) -> Result<SearchResult> {
        let start = Instant::now();
        self.with_deadline(async {
            validate_similarity(opts.min_similarity)?;
            let embedding = self.embedder.embed(text).await?;
            self.run_vector_only(&embedding, opts, start).await
        })
        .await
    }

    pub async fn hybrid_search(
        &self,
        embedding: &[f32],
        text: &str,
        opts: &HybridSearchOptions,
    ) -> Result<SearchResult> {
        let start = Instant::now();
        self.with_deadline(self.run_hybrid(embedding, text, opts, start))
            .await
    }

    pub async fn vector_only_search(
        &self,
        embedding: &[f32],
        opts: &VectorSearchOptions,
    ) -> Result<SearchResult> {
        let start = Instant::now();
        self.with_deadline(async {
            validate_similarity(opts.min_similarity)?;
            self.run_vector_only(embedding, opts, start).await
        })
        .await
    }

    async fn run_hybrid(
        &self,
        embedding: &[f32],
        text: &str,
        opts: &HybridSearchOptions,
        start: Instant,
    ) -> Result<SearchResult> {
        self.validate_embedding(embedding)?;

        let limit = normalize_limit(opts.limit);
        if limit == 0 {
            return Ok(SearchResult::empty(elapsed_ms(start)));
        }
        if let Some(types) = &opts.entity_types {
            tracing::debug!(?types, "entity_types filter supplied but not applied");
        }

        let max_candidates = limit * CANDIDATE_MULTIPLIER;
        let (vector_hits, lexical_hits) = tokio::try_join!(
            self.vector.rank(embedding, max_candidates, None),
            self.lexical.rank(text, max_candidates),
        )?;

        let fused = rrf_fuse(&vector_hits, &lexical_hits, opts.rrf_k, limit);
        tracing::debug!(
            limit,
            vector = vector_hits.len(),
            lexical = lexical_hits.len(),
            fused = fused.len(),
            "Fused candidate lists"
        );

        self.finish(fused.iter().map(Candidate::id), start).await
    }

    async fn run_vector_only(
        &self,
        embedding: &[f32],
        opts: &VectorSearchOptions,
        start: Instant,
    ) -> Result<SearchResult> {
        self.validate_embedding(embedding)?;

        let limit = normalize_limit(opts.limit);
        if limit == 0 {
            return Ok(SearchResult::empty(elapsed_ms(start)));
        }

        let hits = self
            .vector
            .rank(embedding, limit, Some(opts.min_similarity))
            .await?;

        self.finish(hits.iter().map(|h| h.id.as_str()), start).await
    }

    async fn finish<'a>(
        &self,
        ids: impl Iterator<Item = &'a str>,
        start: Instant,
    ) -> Result<SearchResult> {
        let ids: Vec<String> = ids.map(str::to_string).collect();
        if ids.is_empty() {
            return Ok(SearchResult::empty(elapsed_ms(start)));
        }

        let (entities, relations) = self.hydrator.hydrate(&ids).await?;
        let result = SearchResult::new(entities, relations, elapsed_ms(start));

        tracing::info!(
            total = result.total,
            relations = result.relations.len(),
            time_taken = result.time_taken,
            "Search complete"
        );
        Ok(result)
    }

    fn validate_embedding(&self, embedding: &[f32]) -> Result<()> {
        if embedding.is_empty() {
            return Err(AppError::InvalidInput("query vector is empty".to_string()));
        }
        let expected = self.embedder.dimensions();
        if embedding.len() != expected {
            return Err(AppError::InvalidInput(format!(
                "query vector has {} dimensions, expected {}",
                embedding.len(),
                expected
            )));
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(AppError::InvalidInput(
                "query vector contains non-finite values".to_string(),
            ));
        }
        if is_zero_vector(embedding) {
            return Err(AppError::InvalidInput(
                "query vector has zero length".to_string(),
            ));
        }
        Ok(())
    }

    async fn with_deadline<F>(&self, fut: F) -> Result<SearchResult>
    where
        F: Future<Output = Result<SearchResult>>,
    {
        match self.timeout {
            None => fut.await,
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                tracing::warn!(timeout_ms = limit.as_millis() as u64, "Search timed out");
                AppError::Timeout(limit.as_millis() as u64)
            })?,
        }
    }
}

fn validate_similarity(min_similarity: f32) -> Result<()> {
    if !(-1.0..=1.0).contains(&min_similarity) {
        return Err(AppError::InvalidInput(format!(
            "min_similarity must be within [-1, 1], got {}",
            min_similarity
        )));
    }
    Ok(())
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
