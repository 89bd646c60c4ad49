// crates/foresight-validator/src/dispatcher.rs
//
// Prediction Dispatcher: create a task, ask every peer for a forecast, and
// record what came back.
//
// All peer calls of a round are spawned before any is awaited, so a round
// takes about as long as the slowest peer (capped by the call timeout)
// rather than the sum of all peers. A peer that errors, times out, or
// answers garbage is recorded with the no-answer sentinel and affects no
// other peer. A call that panics is recorded the same way.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::task::{Id, JoinSet};

use foresight_core::error::ForesightError;
use foresight_core::peer::PeerInfo;
use foresight_core::task::Task;
use foresight_core::traits::{PeerRpc, TaskSelector, TaskStore};

use crate::directory::PeerDirectory;

/// Timestamps are redrawn this many times on collision before giving up.
const MAX_TIMESTAMP_ATTEMPTS: usize = 8;

/// Timing knobs of a dispatch round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Earliest task timestamp, in seconds after `now`.
    pub min_lead_secs: u64,
    /// Latest task timestamp, in seconds after `now`.
    pub horizon_secs: u64,
    /// Deadline for each peer's answer.
    pub call_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            min_lead_secs: 60,
            horizon_secs: 8 * 3600,
            call_timeout: Duration::from_secs(65),
        }
    }
}

/// Outcome counts of one poll round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSummary {
    /// Peers that returned a usable value.
    pub answered: usize,
    /// Peers that errored, timed out, or returned garbage.
    pub failed: usize,
    /// Answer rows written to the store (answered and failed alike).
    pub persisted: usize,
}

pub struct Dispatcher {
    store: Arc<dyn TaskStore>,
    directory: PeerDirectory,
    rpc: Arc<dyn PeerRpc>,
    selector: Arc<dyn TaskSelector>,
    subnet_id: u16,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn TaskStore>,
        directory: PeerDirectory,
        rpc: Arc<dyn PeerRpc>,
        selector: Arc<dyn TaskSelector>,
        subnet_id: u16,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            directory,
            rpc,
            selector,
            subnet_id,
            settings,
        }
    }

    /// Inclusive range a task created at `now` may be scheduled in.
    pub fn timestamp_range(&self, now: u64) -> (u64, u64) {
        let earliest = now.saturating_add(self.settings.min_lead_secs);
        let latest = now.saturating_add(self.settings.horizon_secs).max(earliest);
        (earliest, latest)
    }

    /// Choose what to forecast and when, and persist the pending task.
    pub async fn create_task(&self, now: u64) -> Result<Task, ForesightError> {
        let (category, instrument) = self.selector.select();
        let (earliest, latest) = self.timestamp_range(now);

        let mut last_err = ForesightError::DuplicateTask(earliest);
        for _ in 0..MAX_TIMESTAMP_ATTEMPTS {
            let timestamp = rand::thread_rng().gen_range(earliest..=latest);
            match self.store.insert_task(timestamp, &category, &instrument).await {
                Ok(task) => {
                    tracing::info!(
                        "Created task {}/{} for timestamp {} ({}s ahead)",
                        task.category,
                        task.instrument,
                        task.timestamp,
                        task.timestamp - now
                    );
                    return Ok(task);
                }
                Err(ForesightError::DuplicateTask(ts)) => {
                    tracing::debug!("Task timestamp {} already taken, redrawing", ts);
                    last_err = ForesightError::DuplicateTask(ts);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    /// Ask every peer in `peers` about `task` concurrently and persist one
    /// answer row per peer.
    pub async fn poll_all(&self, task: &Task, peers: &BTreeMap<u16, PeerInfo>) -> PollSummary {
        let request = task.request();
        let call_timeout = self.settings.call_timeout;
        let mut calls = JoinSet::new();
        let mut in_flight: HashMap<Id, PeerInfo> = HashMap::with_capacity(peers.len());

        for peer in peers.values() {
            let rpc = self.rpc.clone();
            let target = peer.clone();
            let request = request.clone();
            let handle = calls.spawn(async move {
                match tokio::time::timeout(
                    call_timeout,
                    rpc.generate(&target, &request, call_timeout),
                )
                .await
                {
                    Ok(Ok(value)) if value.is_finite() => Ok(value),
                    Ok(Ok(value)) => Err(ForesightError::MalformedResponse(format!(
                        "non-finite answer {}",
                        value
                    ))),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(ForesightError::Timeout(call_timeout.as_millis() as u64)),
                }
            });
            in_flight.insert(handle.id(), peer.clone());
        }

        let mut summary = PollSummary::default();
        while let Some(joined) = calls.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => (
                    e.id(),
                    Err(ForesightError::Network(format!("peer call aborted: {}", e))),
                ),
            };
            let Some(peer) = in_flight.remove(&id) else {
                tracing::error!("Peer call {} for task {} has no owner", id, task.timestamp);
                summary.failed += 1;
                continue;
            };

            let value = match outcome {
                Ok(value) => {
                    tracing::debug!("Peer {} ({}) answered {}", peer.uid, peer.address, value);
                    summary.answered += 1;
                    Some(value)
                }
                Err(e) => {
                    tracing::debug!("Peer {} ({}) gave no answer: {}", peer.uid, peer.address, e);
                    summary.failed += 1;
                    None
                }
            };

            match self
                .store
                .record_answer(task.timestamp, &peer.identity, value, &task.category, &task.instrument)
                .await
            {
                Ok(()) => summary.persisted += 1,
                Err(e) => tracing::warn!(
                    "Could not record answer of {} for task {}: {}",
                    peer.identity,
                    task.timestamp,
                    e
                ),
            }
        }

        summary
    }

    /// One full dispatch round: resolve peers, create a task, poll everyone.
    pub async fn run_round(&self, now: u64) -> Result<(Task, PollSummary), ForesightError> {
        let peers = self.directory.list_peers(self.subnet_id).await?;
        let task = self.create_task(now).await?;
        let summary = self.poll_all(&task, &peers).await;

        tracing::info!(
            "Task {}: polled {} peers, {} answered, {} failed, {} recorded",
            task.timestamp,
            peers.len(),
            summary.answered,
            summary.failed,
            summary.persisted
        );
        Ok((task, summary))
    }
}
