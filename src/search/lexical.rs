use std::sync::Arc;

use crate::storage::GraphStore;
use crate::types::{parse_observations, LexicalRow, RankedHit, Result};

pub const NAME_MATCH_BOOST: f64 = 2.0;
pub const NAME_BASE: f64 = 1.0;
pub const OBSERVATION_WEIGHT: f64 = 0.5;

/// Case-sensitive substring ranking over entity names and observations.
pub struct LexicalRanker {
    store: Arc<dyn GraphStore>,
}

impl LexicalRanker {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub async fn rank(&self, query: &str, max_candidates: usize) -> Result<Vec<RankedHit>> {
        if query.is_empty() || max_candidates == 0 {
            return Ok(vec![]);
        }

        let rows = self.store.substring_candidates(query).await?;
        let scanned = rows.len();
        let hits = rank_rows(rows, query, max_candidates);

        tracing::debug!(
            scanned,
            candidates = hits.len(),
            max_candidates,
            "Lexical ranking complete"
        );
        Ok(hits)
    }
}

/// Score every row, drop non-matches, order by score keeping the store's
/// order among equal scores.
pub fn rank_rows(rows: Vec<LexicalRow>, query: &str, max_candidates: usize) -> Vec<RankedHit> {
    let mut hits: Vec<RankedHit> = rows
        .into_iter()
        .filter_map(|row| {
            let score = lexical_score(&row, query)?;
            Some(RankedHit::new(row.name, row.entity_type, score))
        })
        .collect();

    // sort_by is stable
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(max_candidates);
    hits
}

/// `None` when neither the name nor any observation contains `query`.
pub fn lexical_score(row: &LexicalRow, query: &str) -> Option<f64> {
    let name_match = row.name.contains(query);
    let obs_matches = count_observation_matches(row, query);

    if !name_match && obs_matches == 0 {
        return None;
    }

    let boost = if name_match {
        NAME_MATCH_BOOST
    } else {
        NAME_BASE
    };
    Some(boost + OBSERVATION_WEIGHT * obs_matches as f64)
}

fn count_observation_matches(row: &LexicalRow, query: &str) -> usize {
    let Some(raw) = row.observations.as_deref() else {
        return 0;
    };
    match parse_observations(raw) {
        Ok(observations) => observations.iter().filter(|o| o.contains(query)).count(),
        Err(e) => {
            tracing::warn!(entity = %row.name, error = %e, "Unreadable observations, scoring name only");
            0
        }
    }
}
