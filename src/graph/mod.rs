//! Graph-side ranking helpers
//!
//! - `rrf`: Reciprocal Rank Fusion for hybrid search merging

pub mod rrf;

pub use rrf::{rrf_fuse, rrf_score, RRF_K};
