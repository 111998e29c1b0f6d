//! Probabilistic fragment-to-subset assignment.
//!
//! Every fragment was searched against every alignment subset; this module
//! turns the raw bit scores into a weighted multi-assignment: enough
//! subsets are selected, best first, to reach a cumulative probability
//! threshold, and the selected probabilities are re-normalized into
//! fixed-point weights. Fragments with no hits anywhere receive no
//! assignment and are logged.

use std::collections::BTreeMap;

use crate::fragments::FragmentSet;
use crate::problem::{NodeId, ProblemTree};

/// Fixed-point scale for probabilities: 1.0 maps to 1_000_000.
pub const FIXED_POINT_ONE: u64 = 1_000_000;

/// Bit scores are capped before exponentiation so `2^s` cannot overflow an
/// f64. Relative ordering is preserved for any realistic score range.
pub const BIT_SCORE_CAP: f64 = 1022.0;

/// One search hit: a fragment scored against a candidate alignment subset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredHit {
    pub bit_score: f64,
    pub subset: NodeId,
}

/// Final assignment of one fragment copy to one alignment subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedAssignment {
    pub fragment: String,
    /// Fixed-point weight in `[0, 1_000_000]`.
    pub weight: u64,
    pub subset: NodeId,
}

/// Convert one fragment's hit list into selected `(weight, subset)` pairs.
///
/// Steps: overflow-capped likelihood `2^min(s, 1022)`, normalization to
/// fixed-point probabilities, stable descending sort (ties keep encounter
/// order), minimal prefix reaching `threshold` (always at least one), and
/// re-normalization of the selected weights to sum exactly to
/// [`FIXED_POINT_ONE`]. With weighting disabled every selected subset gets
/// the full weight instead.
pub fn weigh_hits(
    hits: &[ScoredHit],
    threshold: f64,
    weight_by_alignment: bool,
) -> Vec<(u64, NodeId)> {
    if hits.is_empty() {
        return Vec::new();
    }

    let likelihoods: Vec<f64> = hits
        .iter()
        .map(|h| 2f64.powf(h.bit_score.min(BIT_SCORE_CAP)))
        .collect();
    let denom: f64 = likelihoods.iter().sum();

    let mut scaled: Vec<(f64, NodeId)> = likelihoods
        .iter()
        .zip(hits)
        .map(|(lik, hit)| (lik / denom * FIXED_POINT_ONE as f64, hit.subset))
        .collect();
    // Stable, so equal probabilities keep their encounter order.
    scaled.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let threshold_fp = FIXED_POINT_ONE as f64 * threshold;
    let mut cumulative = 0.0;
    let mut take = 0;
    for (prob, _) in &scaled {
        take += 1;
        cumulative += prob;
        if cumulative >= threshold_fp {
            break;
        }
    }
    let selected = &scaled[..take.max(1)];

    if !weight_by_alignment {
        return selected
            .iter()
            .map(|&(_, subset)| (FIXED_POINT_ONE, subset))
            .collect();
    }

    // Re-normalize so the selected weights sum exactly to one; rounding
    // remainder goes to the last selected candidate.
    let selected_sum: f64 = selected.iter().map(|(p, _)| p).sum();
    let mut weights = Vec::with_capacity(selected.len());
    let mut allotted: u64 = 0;
    for (i, &(prob, subset)) in selected.iter().enumerate() {
        let weight = if i + 1 == selected.len() {
            FIXED_POINT_ONE.saturating_sub(allotted)
        } else {
            (prob / selected_sum * FIXED_POINT_ONE as f64).round() as u64
        };
        allotted += weight;
        weights.push((weight, subset));
    }
    weights
}

/// Assign every scored fragment to its selected subsets, appending one
/// renamed copy `<fragment>_<subset label>_<weight>` per selection to the
/// target subset's fragment collection. Returns the full assignment for
/// diagnostics and testing.
///
/// Fragments with an empty hit list are excluded and logged; they are the
/// only fragments that receive no assignment.
pub fn distribute_fragments(
    tree: &mut ProblemTree,
    root_fragments: &FragmentSet,
    bitscores: &BTreeMap<String, Vec<ScoredHit>>,
    threshold: f64,
    weight_by_alignment: bool,
) -> Vec<WeightedAssignment> {
    let mut assignments = Vec::new();
    for (fragment, hits) in bitscores {
        if hits.is_empty() {
            tracing::warn!(fragment = %fragment, "Fragment is not scored against any subset");
            continue;
        }
        let sequence = match root_fragments.get(fragment) {
            Some(sequence) => sequence,
            None => {
                tracing::warn!(
                    fragment = %fragment,
                    "Scored fragment is missing from the root collection, skipping"
                );
                continue;
            }
        };
        let selected = weigh_hits(hits, threshold, weight_by_alignment);
        tracing::debug!(
            fragment = %fragment,
            subsets = selected.len(),
            "Fragment assigned"
        );
        for (weight, subset) in selected {
            let copy_name = format!("{}_{}_{}", fragment, tree.node(subset).label, weight);
            tree.node_mut(subset)
                .fragments
                .get_or_insert_with(FragmentSet::new)
                .insert(copy_name, sequence);
            assignments.push(WeightedAssignment {
                fragment: fragment.clone(),
                weight,
                subset,
            });
        }
    }
    assignments
}

/// Parse a search job's declared output: a whitespace-separated score
/// table (`fragment  e_value  bit_score`), `#` comment lines skipped.
pub fn parse_score_table(text: &str) -> Vec<(String, f64)> {
    let mut scores = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let name = match fields.next() {
            Some(name) => name,
            None => continue,
        };
        let _evalue = fields.next();
        if let Some(score) = fields.next().and_then(|s| s.parse::<f64>().ok()) {
            scores.push((name.to_string(), score));
        }
    }
    scores
}
