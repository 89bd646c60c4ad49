// crates/foresight-core/src/traits.rs

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ForesightError;
use crate::peer::PeerInfo;
use crate::task::{ForecastRequest, ScoredAnswer, Task};

/// Persistent storage for forecasting tasks and peer answers.
///
/// Implemented by foresight-store (RocksDB backend). Every method must be
/// atomic with respect to concurrent callers; the three validator loops
/// share one handle.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Ensure the keyspaces exist. Safe to call repeatedly.
    async fn create_schema(&self) -> Result<(), ForesightError>;

    /// Persist a new pending task. Fails with `DuplicateTask` if one
    /// already exists for `timestamp`.
    async fn insert_task(
        &self,
        timestamp: u64,
        category: &str,
        instrument: &str,
    ) -> Result<Task, ForesightError>;

    /// Record one peer's answer. `None` (and non-finite values) are stored
    /// as the no-answer sentinel.
    async fn record_answer(
        &self,
        timestamp: u64,
        peer_id: &str,
        value: Option<f64>,
        category: &str,
        instrument: &str,
    ) -> Result<(), ForesightError>;

    /// Fill in the ground truth for a pending task. Returns `Ok(false)`
    /// without changing anything when the task is unknown or already set.
    async fn set_observed_value(
        &self,
        timestamp: u64,
        category: &str,
        instrument: &str,
        value: f64,
    ) -> Result<bool, ForesightError>;

    /// The earliest task whose observed value is still missing.
    async fn next_pending_task(&self) -> Result<Option<Task>, ForesightError>;

    /// Answers joined with their tasks, for tasks at or after `cutoff` that
    /// have an observed value, grouped by peer identity.
    async fn tasks_and_answers_since(
        &self,
        cutoff: u64,
    ) -> Result<BTreeMap<String, Vec<ScoredAnswer>>, ForesightError>;
}

/// The shared ledger, as far as the validator needs it.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Look up a subnet id by name. Fails with `SubnetNotFound`.
    async fn resolve_subnet_id(&self, name: &str) -> Result<u16, ForesightError>;

    /// Registered (free-form) address string per peer uid.
    async fn list_peer_addresses(&self, subnet_id: u16)
        -> Result<HashMap<u16, String>, ForesightError>;

    /// Registered identity key per peer uid.
    async fn list_peer_identities(
        &self,
        subnet_id: u16,
    ) -> Result<HashMap<u16, String>, ForesightError>;

    /// Submit one weight vector signed by `signer`. `uids` and `weights`
    /// are parallel.
    async fn submit_weights(
        &self,
        signer: &str,
        subnet_id: u16,
        uids: &[u16],
        weights: &[u16],
    ) -> Result<(), ForesightError>;
}

/// The single remote capability a peer exposes: produce a forecast.
///
/// Implemented by foresight-client over HTTP and by stubs in tests.
#[async_trait]
pub trait PeerRpc: Send + Sync {
    async fn generate(
        &self,
        peer: &PeerInfo,
        request: &ForecastRequest,
        timeout: Duration,
    ) -> Result<f64, ForesightError>;
}

/// Source of ground-truth values. Any failure is reported as `None`; the
/// caller retries on a later cycle.
#[async_trait]
pub trait TruthOracle: Send + Sync {
    async fn fetch_observed_value(
        &self,
        category: &str,
        instrument: &str,
        timestamp: u64,
    ) -> Option<f64>;
}

/// Strategy for choosing what the next task forecasts.
pub trait TaskSelector: Send + Sync {
    /// Returns `(category, instrument)`.
    fn select(&self) -> (String, String);
}
