//! Reciprocal Rank Fusion (RRF) for hybrid search
//!
//! Merges the vector and lexical rankings into a single fused list.
//! Only the rank of an entry counts toward its fused score; the raw
//! similarity / lexical scores are carried along for diagnostics.

use std::collections::HashMap;

use crate::types::{Candidate, RankedHit};

/// RRF constant (standard value from literature)
pub const RRF_K: u32 = 60;

/// Positional score of the entry at zero-based `rank`.
pub fn rrf_score(k: u32, rank: usize) -> f64 {
    1.0 / (f64::from(k) + rank as f64 + 1.0)
}

#[derive(Debug)]
struct Accumulator<'a> {
    id: &'a str,
    entity_type: &'a str,
    vector_score: Option<f64>,
    bm25_score: Option<f64>,
    fused_score: f64,
}

impl Accumulator<'_> {
    fn into_candidate(self) -> Option<Candidate> {
        let id = self.id.to_string();
        let entity_type = self.entity_type.to_string();
        let fused_score = self.fused_score;
        let candidate = match (self.vector_score, self.bm25_score) {
            (Some(vector_score), Some(bm25_score)) => Candidate::Both {
                id,
                entity_type,
                vector_score,
                bm25_score,
                fused_score,
            },
            (Some(vector_score), None) => Candidate::VectorOnly {
                id,
                entity_type,
                vector_score,
                fused_score,
            },
            (None, Some(bm25_score)) => Candidate::LexicalOnly {
                id,
                entity_type,
                bm25_score,
                fused_score,
            },
            // Accumulators are only created while visiting a list entry.
            (None, None) => return None,
        };
        Some(candidate)
    }
}

/// Fuse the vector and lexical rankings.
///
/// Each list contributes `1 / (k + rank + 1)` per entry. An id present in
/// both lists gets the sum of its two contributions. Results are sorted by
/// fused score descending; equal scores keep the order in which ids were
/// first seen (the whole vector list, then the lexical list). A repeated id
/// within one list only counts at its first position.
///
/// # Arguments
/// * `vector_results` - Vector ranker output, best first
/// * `lexical_results` - Lexical ranker output, best first
/// * `k` - RRF smoothing constant (default 60)
/// * `limit` - Maximum candidates to return
pub fn rrf_fuse(
    vector_results: &[RankedHit],
    lexical_results: &[RankedHit],
    k: u32,
    limit: usize,
) -> Vec<Candidate> {
    // Position in `merged` is the first-seen order used for tie-breaks.
    let mut merged: Vec<Accumulator<'_>> =
        Vec::with_capacity(vector_results.len() + lexical_results.len());
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(merged.capacity());

    for (rank, hit) in vector_results.iter().enumerate() {
        if index.contains_key(hit.id.as_str()) {
            continue;
        }
        index.insert(&hit.id, merged.len());
        merged.push(Accumulator {
            id: &hit.id,
            entity_type: &hit.entity_type,
            vector_score: Some(hit.score),
            bm25_score: None,
            fused_score: rrf_score(k, rank),
        });
    }

    for (rank, hit) in lexical_results.iter().enumerate() {
        if let Some(&pos) = index.get(hit.id.as_str()) {
            let entry = &mut merged[pos];
            if entry.bm25_score.is_none() {
                entry.bm25_score = Some(hit.score);
                entry.fused_score += rrf_score(k, rank);
            }
            continue;
        }
        index.insert(&hit.id, merged.len());
        merged.push(Accumulator {
            id: &hit.id,
            entity_type: &hit.entity_type,
            vector_score: None,
            bm25_score: Some(hit.score),
            fused_score: rrf_score(k, rank),
        });
    }

    let mut ordered: Vec<(usize, Accumulator<'_>)> = merged.into_iter().enumerate().collect();
    ordered.sort_by(|(seen_a, a), (seen_b, b)| {
        b.fused_score
            .total_cmp(&a.fused_score)
            .then_with(|| seen_a.cmp(seen_b))
    });
    ordered.truncate(limit);

    ordered
        .into_iter()
        .filter_map(|(_, acc)| acc.into_candidate())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const EPS: f64 = 1e-12;

    fn hits(ids: &[&str]) -> Vec<RankedHit> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| RankedHit::new(*id, "thing", 1.0 - i as f64 * 0.1))
            .collect()
    }

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.id()).collect()
    }

    fn id_list() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-h]{1,2}", 0..16)
    }

    fn to_hits(ids: &[String]) -> Vec<RankedHit> {
        ids.iter()
            .map(|id| RankedHit::new(id.as_str(), "thing", 0.5))
            .collect()
    }

    proptest! {
        #[test]
        fn prop_fused_scores_follow_first_positions(
            vector in id_list(),
            lexical in id_list(),
            k in 0u32..500,
        ) {
            let fused = rrf_fuse(&to_hits(&vector), &to_hits(&lexical), k, usize::MAX);

            let distinct: HashSet<&String> = vector.iter().chain(lexical.iter()).collect();
            prop_assert_eq!(fused.len(), distinct.len());
            prop_assert!(fused.windows(2).all(|w| w[0].fused_score() >= w[1].fused_score()));

            for candidate in &fused {
                let in_vector = vector.iter().position(|id| id == candidate.id());
                let in_lexical = lexical.iter().position(|id| id == candidate.id());
                let expected = in_vector.map_or(0.0, |i| rrf_score(k, i))
                    + in_lexical.map_or(0.0, |j| rrf_score(k, j));

                prop_assert!(candidate.fused_score() > 0.0);
                prop_assert!((candidate.fused_score() - expected).abs() < EPS);
                prop_assert_eq!(candidate.vector_score().is_some(), in_vector.is_some());
                prop_assert_eq!(candidate.bm25_score().is_some(), in_lexical.is_some());

                if let (Some(i), Some(j)) = (in_vector, in_lexical) {
                    prop_assert!(candidate.fused_score() > rrf_score(k, i));
                    prop_assert!(candidate.fused_score() > rrf_score(k, j));
                }
            }
        }

        #[test]
        fn prop_fusion_is_deterministic_and_limit_is_a_prefix(
            vector in id_list(),
            lexical in id_list(),
            k in 0u32..500,
            limit in 0usize..40,
        ) {
            let vector = to_hits(&vector);
            let lexical = to_hits(&lexical);
            let full = rrf_fuse(&vector, &lexical, k, usize::MAX);
            let first = rrf_fuse(&vector, &lexical, k, limit);
            let second = rrf_fuse(&vector, &lexical, k, limit);

            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.as_slice(), &full[..limit.min(full.len())]);
        }
    }

    #[test]
    fn test_rrf_fuse_empty() {
        assert!(rrf_fuse(&[], &[], RRF_K, 10).is_empty());
    }

    #[test]
    fn test_rrf_fuse_single_source() {
        let results = rrf_fuse(&hits(&["a", "b", "c"]), &[], RRF_K, 10);

        assert_eq!(ids(&results), vec!["a", "b", "c"]);
        for (rank, candidate) in results.iter().enumerate() {
            assert!(matches!(candidate, Candidate::VectorOnly { .. }));
            assert!((candidate.fused_score() - rrf_score(RRF_K, rank)).abs() < EPS);
        }
        assert_eq!(results[0].vector_score(), Some(1.0));
        assert_eq!(results[0].bm25_score(), None);
    }

    #[test]
    fn test_rrf_fuse_both_lists_sum() {
        let vector = hits(&["x", "y", "z"]);
        let lexical = hits(&["q", "z"]);
        let results = rrf_fuse(&vector, &lexical, RRF_K, 10);

        let z = results.iter().find(|c| c.id() == "z").unwrap();
        let expected = 1.0 / 63.0 + 1.0 / 62.0;
        assert!((z.fused_score() - expected).abs() < EPS);
        assert!(matches!(z, Candidate::Both { .. }));
        assert!(z.vector_score().is_some());
        assert!(z.bm25_score().is_some());
    }

    #[test]
    fn test_rrf_fuse_mixed_lists() {
        let vector = hits(&["A", "B", "C"]);
        let lexical = hits(&["B", "D"]);
        let results = rrf_fuse(&vector, &lexical, 60, 10);

        assert_eq!(ids(&results), vec!["B", "A", "D", "C"]);
        // B: vector rank 1, lexical rank 0.
        assert!((results[0].fused_score() - (1.0 / 62.0 + 1.0 / 61.0)).abs() < EPS);
        // A: vector rank 0. D: lexical rank 1. C: vector rank 2.
        assert!((results[1].fused_score() - 1.0 / 61.0).abs() < EPS);
        assert!((results[2].fused_score() - 1.0 / 62.0).abs() < EPS);
        assert!((results[3].fused_score() - 1.0 / 63.0).abs() < EPS);
        assert!((results[3].fused_score() - 0.015_873_0).abs() < 1e-6);

        assert!(matches!(results[0], Candidate::Both { .. }));
        assert!(matches!(results[1], Candidate::VectorOnly { .. }));
        assert!(matches!(results[2], Candidate::LexicalOnly { .. }));
    }

    #[test]
    fn test_rrf_fuse_tie_prefers_first_seen() {
        // Same rank in each list: the vector entry was seen first.
        let results = rrf_fuse(&hits(&["v"]), &hits(&["l"]), RRF_K, 10);
        assert_eq!(ids(&results), vec!["v", "l"]);

        // Lexical-only ties keep lexical order.
        let results = rrf_fuse(&[], &hits(&["m", "n"]), 0, 10);
        assert_eq!(ids(&results), vec!["m", "n"]);
    }

    #[test]
    fn test_rrf_fuse_both_lists_boost_is_strict() {
        for k in [0u32, 1, 10, 60, 1000] {
            for rank in 0..20 {
                let vector = hits(&["a"]);
                let mut lexical: Vec<RankedHit> = (0..rank)
                    .map(|i| RankedHit::new(format!("p{}", i), "thing", 1.0))
                    .collect();
                lexical.push(RankedHit::new("a", "thing", 1.0));

                let fused = rrf_fuse(&vector, &lexical, k, 100);
                let a = fused.iter().find(|c| c.id() == "a").unwrap();
                assert!(a.fused_score() > rrf_score(k, 0));
                assert!(a.fused_score() > rrf_score(k, rank));
            }
        }
    }

    #[test]
    fn test_rrf_fuse_deterministic() {
        let vector = hits(&["1", "2", "3", "4", "5"]);
        let lexical = hits(&["6", "4", "7", "1", "8"]);
        let first = rrf_fuse(&vector, &lexical, RRF_K, 10);
        for _ in 0..20 {
            assert_eq!(rrf_fuse(&vector, &lexical, RRF_K, 10), first);
        }
    }

    #[test]
    fn test_rrf_fuse_truncates() {
        let vector = hits(&["a", "b", "c", "d"]);
        let lexical = hits(&["e", "f"]);
        assert_eq!(rrf_fuse(&vector, &lexical, RRF_K, 3).len(), 3);
        assert!(rrf_fuse(&vector, &lexical, RRF_K, 0).is_empty());
    }

    #[test]
    fn test_rrf_fuse_ignores_rank_not_raw_score() {
        let vector = vec![
            RankedHit::new("low", "t", 0.01),
            RankedHit::new("high", "t", 0.99),
        ];
        let results = rrf_fuse(&vector, &[], RRF_K, 10);
        assert_eq!(ids(&results), vec!["low", "high"]);
        assert_eq!(results[1].vector_score(), Some(0.99));
    }

    #[test]
    fn test_rrf_fuse_duplicate_within_list_counts_once() {
        let vector = vec![
            RankedHit::new("a", "t", 0.9),
            RankedHit::new("a", "t", 0.8),
            RankedHit::new("b", "t", 0.7),
        ];
        let results = rrf_fuse(&vector, &[], RRF_K, 10);
        assert_eq!(ids(&results), vec!["a", "b"]);
        assert!((results[0].fused_score() - rrf_score(RRF_K, 0)).abs() < EPS);
        assert!((results[1].fused_score() - rrf_score(RRF_K, 2)).abs() < EPS);
    }

    #[test]
    fn test_rrf_fuse_complex() {
        let vector = hits(&["1", "2", "3"]);
        let lexical = hits(&["3", "1"]);

        let results = rrf_fuse(&vector, &lexical, RRF_K, 10);

        // Item 1: vector=0, lexical=1 -> 1/61 + 1/62
        // Item 3: vector=2, lexical=0 -> 1/63 + 1/61
        assert_eq!(ids(&results), vec!["1", "3", "2"]);
        assert!(results.iter().all(|c| c.fused_score() > 0.0));
    }
}
