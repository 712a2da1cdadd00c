//! Hybrid retrieval: vector and lexical candidates, fused by reciprocal
//! rank, hydrated into entities with their mutual relations.

mod engine;
mod hydrate;
mod lexical;
mod vector;

pub use engine::SearchEngine;
pub use hydrate::ResultHydrator;
pub use lexical::{lexical_score, rank_rows, LexicalRanker};
pub use vector::VectorRanker;
