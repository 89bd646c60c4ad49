// crates/foresight-core/src/task.rs

use serde::{Deserialize, Serialize};

/// Stored in place of a prediction when a peer failed to answer.
pub const NO_ANSWER: f64 = -1.0;

/// One scheduled forecast: every peer is asked to predict `instrument`
/// (within `category`) at the instant `timestamp`.
///
/// `observed_value` stays `None` until the truth-backfill loop fills it in,
/// and never changes after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unix seconds. Unique across all tasks.
    pub timestamp: u64,
    pub category: String,
    pub instrument: String,
    pub observed_value: Option<f64>,
}

impl Task {
    /// Create a pending task with no observed value.
    pub fn new(timestamp: u64, category: impl Into<String>, instrument: impl Into<String>) -> Self {
        Self {
            timestamp,
            category: category.into(),
            instrument: instrument.into(),
            observed_value: None,
        }
    }

    /// Whether the ground truth for this task is still outstanding.
    pub fn is_pending(&self) -> bool {
        self.observed_value.is_none()
    }

    /// Whether `key` names the same (timestamp, category, instrument).
    pub fn matches(&self, timestamp: u64, category: &str, instrument: &str) -> bool {
        self.timestamp == timestamp && self.category == category && self.instrument == instrument
    }

    /// The request sent to peers for this task.
    pub fn request(&self) -> ForecastRequest {
        ForecastRequest {
            category: self.category.clone(),
            instrument: self.instrument.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// One peer's response to a task. `predicted_value` is [`NO_ANSWER`] when
/// the peer failed, timed out, or replied with garbage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub timestamp: u64,
    /// Ledger identity of the answering peer.
    pub peer_id: String,
    pub predicted_value: f64,
    pub category: String,
    pub instrument: String,
}

impl Answer {
    /// Build an answer row, mapping a missing or non-finite value to [`NO_ANSWER`].
    pub fn new(
        timestamp: u64,
        peer_id: impl Into<String>,
        value: Option<f64>,
        category: impl Into<String>,
        instrument: impl Into<String>,
    ) -> Self {
        let predicted_value = match value {
            Some(v) if v.is_finite() => v,
            _ => NO_ANSWER,
        };
        Self {
            timestamp,
            peer_id: peer_id.into(),
            predicted_value,
            category: category.into(),
            instrument: instrument.into(),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.predicted_value == NO_ANSWER
    }
}

/// A joined (answer, task) row where the task's observed value is known.
/// This is the unit the scoring engine consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAnswer {
    pub timestamp: u64,
    pub category: String,
    pub instrument: String,
    pub predicted_value: f64,
    pub observed_value: f64,
}

impl ScoredAnswer {
    /// Absolute prediction error, or `None` when the peer did not answer.
    pub fn difference(&self) -> Option<f64> {
        if self.predicted_value == NO_ANSWER {
            None
        } else {
            Some((self.observed_value - self.predicted_value).abs())
        }
    }
}

/// Parameters of the remote `generate` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub category: String,
    /// Sent as `pair` on the wire.
    #[serde(rename = "pair")]
    pub instrument: String,
    pub timestamp: u64,
}
