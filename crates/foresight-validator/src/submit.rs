// crates/foresight-validator/src/submit.rs
//
// Scoring cycle: read the scoring window, compute weights, submit them.
//
// The window is `[now - weighting_period - grace, now]`. The grace buffer
// lets tasks whose observed value arrived late still count toward the
// cycle they belong to. uids are looked up fresh from the ledger on every
// cycle because they are reassigned as peers come and go.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use foresight_core::error::ForesightError;
use foresight_core::traits::{LedgerClient, TaskStore};
use foresight_scoring::{compute_scores, ScoringSettings, WeightVector};

use crate::directory::{uid_for_identity, PeerDirectory};

/// What one scoring cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReport {
    /// Peers with at least one row in the window.
    pub peers_in_window: usize,
    /// Peers that ended up with a non-zero weight.
    pub scored: usize,
    /// Entries actually submitted.
    pub submitted: usize,
    /// Scored peers without a current uid.
    pub unresolved: usize,
}

pub struct WeightSubmitter {
    store: Arc<dyn TaskStore>,
    ledger: Arc<dyn LedgerClient>,
    directory: PeerDirectory,
    subnet_id: u16,
    settings: ScoringSettings,
    /// `weighting_period + grace`, in seconds.
    window_secs: u64,
}

impl WeightSubmitter {
    pub fn new(
        store: Arc<dyn TaskStore>,
        ledger: Arc<dyn LedgerClient>,
        directory: PeerDirectory,
        subnet_id: u16,
        settings: ScoringSettings,
        weighting_period_secs: u64,
        grace_secs: u64,
    ) -> Self {
        Self {
            store,
            ledger,
            directory,
            subnet_id,
            settings,
            window_secs: weighting_period_secs.saturating_add(grace_secs),
        }
    }

    /// Earliest task timestamp that counts in a cycle run at `now`.
    pub fn cutoff(&self, now: u64) -> u64 {
        now.saturating_sub(self.window_secs)
    }

    /// Score the window ending at `now` and submit the result.
    ///
    /// Fails with `NotRegistered` if the validator lost its uid, and with
    /// `Ledger` if the submission was rejected. An empty weight vector is
    /// not submitted.
    pub async fn run_cycle(&self, now: u64) -> Result<SubmissionReport, ForesightError> {
        let cutoff = self.cutoff(now);
        let answers = self.store.tasks_and_answers_since(cutoff).await?;
        let scores = compute_scores(&answers, &self.settings);

        let identities = self.directory.identities(self.subnet_id).await?;
        let signer = self.directory.self_identity();
        if uid_for_identity(&identities, signer).is_none() {
            return Err(ForesightError::NotRegistered(signer.to_string()));
        }

        let vector = WeightVector::from_scores(&scores, &identities);
        let mut report = SubmissionReport {
            peers_in_window: answers.len(),
            scored: scores.len(),
            submitted: 0,
            unresolved: vector.unresolved.len(),
        };

        for identity in &vector.unresolved {
            tracing::debug!("Scored peer {} has no uid anymore; dropping", identity);
        }

        if vector.is_empty() {
            tracing::info!(
                "No weights to submit ({} peers in window since {})",
                report.peers_in_window,
                cutoff
            );
            return Ok(report);
        }

        self.ledger
            .submit_weights(signer, self.subnet_id, &vector.uids, &vector.weights)
            .await?;
        report.submitted = vector.len();

        tracing::info!(
            "Submitted {} weights to subnet {} (window since {}, {} unresolved)",
            report.submitted,
            self.subnet_id,
            cutoff,
            report.unresolved
        );
        Ok(report)
    }
}
