// crates/foresight-scoring/src/scoring.rs
//
// Per-peer scoring for the Foresight prediction validator.
//
// A peer's raw score is its mean absolute prediction error over the scoring
// window, inflated for every task it failed to answer. Raw scores are then
// min-max normalized through a steep logistic curve so that the weight
// distribution concentrates on the most accurate peers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use foresight_core::ScoredAnswer;

/// Tunable constants of the scoring policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSettings {
    /// Ceiling of the ledger's integer weight scale.
    pub max_allowed_weights: u16,
    /// Each missed answer counts as `missing_penalty` times the peer's mean error.
    pub missing_penalty: f64,
    /// Raw score given to a peer with no usable answers. Such peers get weight 0.
    pub worst_score: f64,
    /// Steepness `k` of the normalization curve.
    pub sigmoid_steepness: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            max_allowed_weights: 800,
            missing_penalty: 5.0,
            worst_score: 10_000_000.0,
            sigmoid_steepness: 10.0,
        }
    }
}

/// Logistic curve centered at 0.5: `1 / (1 + e^(-k (x - 0.5)))`.
///
/// For `x` in `[0, 1]` and a large `k`, values near 1 map close to 1 and
/// everything below the midpoint is squashed toward 0.
pub fn sigmoid_steep(x: f64, steepness: f64) -> f64 {
    1.0 / (1.0 + (-steepness * (x - 0.5)).exp())
}

/// Raw (lower is better) score of one peer over its window rows.
///
/// `(sum(d) + missing * penalty * mean(d)) / (count(d) + missing)`, or
/// `settings.worst_score` when the peer never produced a usable answer.
pub fn raw_score(rows: &[ScoredAnswer], settings: &ScoringSettings) -> f64 {
    let differences: Vec<f64> = rows.iter().filter_map(ScoredAnswer::difference).collect();
    let missing = (rows.len() - differences.len()) as f64;

    if differences.is_empty() {
        return settings.worst_score;
    }

    let count = differences.len() as f64;
    let sum: f64 = differences.iter().sum();
    let mean = sum / count;
    (sum + missing * settings.missing_penalty * mean) / (count + missing)
}

/// Compute the integer weight of every peer in `answers_by_peer`.
///
/// Peers in the worst bucket, peers whose raw score overflowed to a
/// non-finite value, and peers whose weight rounds to zero are absent from
/// the result. When every remaining peer has the same raw
/// score, each receives exactly `max_allowed_weights`.
pub fn compute_scores(
    answers_by_peer: &BTreeMap<String, Vec<ScoredAnswer>>,
    settings: &ScoringSettings,
) -> BTreeMap<String, u16> {
    let ranked: BTreeMap<&str, f64> = answers_by_peer
        .iter()
        .map(|(peer, rows)| (peer.as_str(), raw_score(rows, settings)))
        .filter(|(_, score)| score.is_finite() && *score != settings.worst_score)
        .collect();

    if ranked.is_empty() {
        return BTreeMap::new();
    }

    let min = ranked.values().copied().fold(f64::INFINITY, f64::min);
    let max = ranked.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let ceiling = settings.max_allowed_weights as f64;

    ranked
        .into_iter()
        .filter_map(|(peer, score)| {
            let normalized = if max == min {
                1.0
            } else {
                sigmoid_steep((max - score) / (max - min), settings.sigmoid_steepness)
            };
            let weight = (normalized * ceiling).round().clamp(0.0, ceiling) as u16;
            (weight > 0).then(|| (peer.to_string(), weight))
        })
        .collect()
}
