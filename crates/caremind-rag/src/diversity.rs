//! Diversity-constrained top-k selection.
//!
//! Guarantees: result size ≤ k; if at least `min_distinct_sources` distinct
//! sources exist among the candidates, the result represents at least that
//! many; otherwise it represents as many as exist. Ties break by earlier
//! candidate position (stable).

use std::collections::HashSet;

/// Select up to `k` candidates from a list already ordered by score
/// descending, under the minimum-distinct-sources constraint.
///
/// Two passes:
/// 1. Scan in score order, accepting at most one candidate per
///    not-yet-represented source, until `min_distinct_sources` sources are
///    represented (or candidates run out).
/// 2. Fill the remaining slots up to `k` in pure score order; duplicates of
///    already-accepted sources are allowed.
pub fn select_diverse<T>(
    candidates: Vec<T>,
    k: usize,
    min_distinct_sources: usize,
    source_of: impl Fn(&T) -> &str,
) -> Vec<T> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut taken = vec![false; candidates.len()];
    let mut represented: HashSet<&str> = HashSet::new();
    let mut count = 0usize;

    // Pass 1: one per new source, up to the diversity minimum.
    for (i, candidate) in candidates.iter().enumerate() {
        if count >= k || represented.len() >= min_distinct_sources {
            break;
        }
        let source = source_of(candidate);
        if represented.contains(source) {
            continue;
        }
        represented.insert(source);
        taken[i] = true;
        count += 1;
    }

    // Pass 2: fill remaining slots by score order.
    for i in 0..candidates.len() {
        if count >= k {
            break;
        }
        if !taken[i] {
            taken[i] = true;
            count += 1;
        }
    }

    // Emit in original (score) order, which keeps ties stable.
    candidates
        .into_iter()
        .zip(taken)
        .filter_map(|(c, t)| t.then_some(c))
        .collect()
}
