pub mod entity;
pub mod error;
pub mod search;

pub use entity::{
    format_epoch_date, parse_observations, serialize_observations, Entity, EntityRecord, Relation,
};
pub use error::{AppError, Result};
pub use search::{
    normalize_limit, Candidate, HybridSearchOptions, LexicalRow, RankedHit, SearchResult,
    VectorSearchOptions, DEFAULT_LIMIT, DEFAULT_MIN_SIMILARITY, MAX_LIMIT,
};
