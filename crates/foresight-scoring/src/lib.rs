// crates/foresight-scoring/src/lib.rs
//
// foresight-scoring: Scoring engine for the Foresight prediction validator.
//
// Turns joined (answer, observed value) rows into per-peer integer weights,
// and maps those weights onto the ledger's numeric peer ids for submission.

pub mod scoring;
pub mod weights;

pub use scoring::{compute_scores, raw_score, sigmoid_steep, ScoringSettings};
pub use weights::WeightVector;
