//! Graph store capability trait
//!
//! The search core only needs three read capabilities from the graph
//! store. Query syntax stays inside the implementation (SurrealStorage).

use async_trait::async_trait;

use crate::types::{EntityRecord, LexicalRow, RankedHit, Relation};
use crate::Result;

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Nearest visible entities to `embedding` by cosine similarity,
    /// best first, at most `limit` of them. When `min_similarity` is set,
    /// entities scoring below it are excluded.
    async fn nearest_entities(
        &self,
        embedding: &[f32],
        limit: usize,
        min_similarity: Option<f32>,
    ) -> Result<Vec<RankedHit>>;

    /// Visible entities whose name or serialized observations contain
    /// `query` (case-sensitive), in the store's natural order. May include
    /// rows that do not actually match; callers re-check.
    async fn substring_candidates(&self, query: &str) -> Result<Vec<LexicalRow>>;

    /// Visible entities among `names`, plus visible relations whose
    /// endpoints are both in `names`. No ordering guarantee.
    async fn hydrate(&self, names: &[String]) -> Result<(Vec<EntityRecord>, Vec<Relation>)>;

    /// Check if the store is healthy and responsive
    async fn health_check(&self) -> Result<bool>;
}
