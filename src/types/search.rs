use serde::{Deserialize, Serialize};

use super::entity::{Entity, Relation};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.6;

/// One entry of a ranker's score-ordered output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub id: String,
    pub entity_type: String,
    pub score: f64,
}

impl RankedHit {
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            score,
        }
    }
}

/// Entity fields the lexical ranker scores against.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalRow {
    pub name: String,
    pub entity_type: String,
    /// Serialized observation list, as stored.
    pub observations: Option<String>,
}

/// A fused candidate. Which rankers produced it is encoded in the variant,
/// so a candidate without any source score cannot exist.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Candidate {
    VectorOnly {
        id: String,
        entity_type: String,
        vector_score: f64,
        fused_score: f64,
    },
    LexicalOnly {
        id: String,
        entity_type: String,
        bm25_score: f64,
        fused_score: f64,
    },
    Both {
        id: String,
        entity_type: String,
        vector_score: f64,
        bm25_score: f64,
        fused_score: f64,
    },
}

impl Candidate {
    pub fn id(&self) -> &str {
        match self {
            Self::VectorOnly { id, .. } | Self::LexicalOnly { id, .. } | Self::Both { id, .. } => id,
        }
    }

    pub fn fused_score(&self) -> f64 {
        match self {
            Self::VectorOnly { fused_score, .. }
            | Self::LexicalOnly { fused_score, .. }
            | Self::Both { fused_score, .. } => *fused_score,
        }
    }

    pub fn vector_score(&self) -> Option<f64> {
        match self {
            Self::VectorOnly { vector_score, .. } | Self::Both { vector_score, .. } => {
                Some(*vector_score)
            }
            Self::LexicalOnly { .. } => None,
        }
    }

    pub fn bm25_score(&self) -> Option<f64> {
        match self {
            Self::LexicalOnly { bm25_score, .. } | Self::Both { bm25_score, .. } => {
                Some(*bm25_score)
            }
            Self::VectorOnly { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    pub total: usize,
    /// Wall-clock milliseconds from operation start to result assembly.
    pub time_taken: u64,
}

impl SearchResult {
    pub fn empty(time_taken: u64) -> Self {
        Self {
            time_taken,
            ..Self::default()
        }
    }

    pub fn new(entities: Vec<Entity>, relations: Vec<Relation>, time_taken: u64) -> Self {
        Self {
            total: entities.len(),
            entities,
            relations,
            time_taken,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSearchOptions {
    pub limit: usize,
    pub rrf_k: u32,
    /// Accepted for parity with vector-only search; hybrid candidate
    /// generation does not apply it.
    pub min_similarity: f32,
    /// Accepted but not applied to fused candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_types: Option<Vec<String>>,
}

impl Default for HybridSearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            rrf_k: crate::graph::RRF_K,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            entity_types: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSearchOptions {
    pub limit: usize,
    /// Hard floor: no returned entity scores below it.
    pub min_similarity: f32,
}

impl Default for VectorSearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            min_similarity: DEFAULT_MIN_SIMILARITY,
        }
    }
}

pub fn normalize_limit(limit: usize) -> usize {
    limit.min(MAX_LIMIT)
}
