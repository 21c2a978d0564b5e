//! Reciprocal rank fusion over a lexical and a dense candidate list.
//!
//! Each hit scores `weight / (K + rank)` per list it appears in, with
//! 1-based ranks. A hit absent from one list simply contributes no term
//! for it.

use std::collections::HashMap;

pub const RRF_K: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub text: f64,
    pub knn: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            text: 0.4,
            knn: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit<T> {
    pub id: String,
    pub payload: T,
    pub score: f64,
}

/// Fuse two ranked candidate lists into one, best first. When the same
/// id appears in both lists the lexical payload wins and the scores add.
/// Equal scores fall back to ascending id so the order is stable.
pub fn fuse_ranked<T: Clone>(
    lexical: &[(String, T)],
    dense: &[(String, T)],
    weights: FusionWeights,
    limit: usize,
) -> Vec<FusedHit<T>> {
    let mut fused: HashMap<String, FusedHit<T>> = HashMap::new();

    for (rank, (id, payload)) in lexical.iter().enumerate() {
        let contribution = weights.text / (RRF_K + (rank + 1) as f64);
        fused
            .entry(id.clone())
            .and_modify(|hit| hit.score += contribution)
            .or_insert_with(|| FusedHit {
                id: id.clone(),
                payload: payload.clone(),
                score: contribution,
            });
    }

    for (rank, (id, payload)) in dense.iter().enumerate() {
        let contribution = weights.knn / (RRF_K + (rank + 1) as f64);
        fused
            .entry(id.clone())
            .and_modify(|hit| hit.score += contribution)
            .or_insert_with(|| FusedHit {
                id: id.clone(),
                payload: payload.clone(),
                score: contribution,
            });
    }

    let mut results: Vec<FusedHit<T>> = fused.into_values().collect();
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    results.truncate(limit);
    results
}
