// crates/foresight-validator/src/orchestrator.rs
//
// Loop Orchestrator: the validator's three periodic loops under one
// lifetime.
//
//   - dispatch:  create a task and poll every peer      (iteration_interval)
//   - backfill:  fill in the earliest due observed value (real_data_interval)
//   - scoring:   score the window and submit weights    (weighting_period)
//
// Each loop is paced by a `Pacer`, logs and swallows iteration errors, and
// exits when the shutdown watch flips. `run` returns after all three exit.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use foresight_core::error::ForesightError;
use foresight_core::task::Task;
use foresight_core::traits::{TaskStore, TruthOracle};

use crate::dispatcher::Dispatcher;
use crate::pacing::Pacer;
use crate::submit::WeightSubmitter;

/// Consecutive oracle misses on one pending task before backfill warns
/// that it is stalled, and the interval between repeated warnings.
const BACKFILL_STALL_WARN_AFTER: u32 = 10;

/// Current unix time in whole seconds.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Periods of the three loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSettings {
    pub iteration_interval: Duration,
    pub real_data_interval: Duration,
    pub weighting_period: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            iteration_interval: Duration::from_secs(60),
            real_data_interval: Duration::from_secs(60),
            weighting_period: Duration::from_secs(3600),
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn TaskStore>,
    oracle: Arc<dyn TruthOracle>,
    dispatcher: Dispatcher,
    submitter: WeightSubmitter,
    settings: LoopSettings,
    /// `(timestamp, consecutive misses)` of the task backfill is stuck on.
    backfill_stall: Mutex<(u64, u32)>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn TaskStore>,
        oracle: Arc<dyn TruthOracle>,
        dispatcher: Dispatcher,
        submitter: WeightSubmitter,
        settings: LoopSettings,
    ) -> Self {
        Self {
            store,
            oracle,
            dispatcher,
            submitter,
            settings,
            backfill_stall: Mutex::new((0, 0)),
        }
    }

    /// Run all three loops until `shutdown` flips to `true`.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Validator loops started (dispatch every {:?}, backfill every {:?}, scoring every {:?})",
            self.settings.iteration_interval,
            self.settings.real_data_interval,
            self.settings.weighting_period
        );

        let dispatch = {
            let this = self.clone();
            let pacer = Pacer::new(self.settings.iteration_interval, shutdown.clone());
            tokio::spawn(run_paced("dispatch", pacer, move || {
                let this = this.clone();
                async move { this.dispatch_step(unix_now()).await.map(|_| ()) }
            }))
        };

        let backfill = {
            let this = self.clone();
            let pacer = Pacer::new(self.settings.real_data_interval, shutdown.clone());
            tokio::spawn(run_paced("backfill", pacer, move || {
                let this = this.clone();
                async move { this.backfill_step(unix_now()).await.map(|_| ()) }
            }))
        };

        let scoring = {
            let this = self.clone();
            let pacer = Pacer::new(self.settings.weighting_period, shutdown);
            tokio::spawn(run_paced("scoring", pacer, move || {
                let this = this.clone();
                async move { this.scoring_step(unix_now()).await.map(|_| ()) }
            }))
        };

        for (name, handle) in [("dispatch", dispatch), ("backfill", backfill), ("scoring", scoring)] {
            if let Err(e) = handle.await {
                tracing::error!("{} loop terminated abnormally: {}", name, e);
            }
        }
        tracing::info!("Validator loops stopped");
    }

    /// One iteration of each loop, in order. Errors are logged, not returned.
    pub async fn run_once(&self, now: u64) {
        if let Err(e) = self.dispatch_step(now).await {
            tracing::error!("dispatch iteration failed: {}", e);
        }
        if let Err(e) = self.backfill_step(now).await {
            tracing::error!("backfill iteration failed: {}", e);
        }
        if let Err(e) = self.scoring_step(now).await {
            tracing::error!("scoring iteration failed: {}", e);
        }
    }

    pub async fn dispatch_step(&self, now: u64) -> Result<Task, ForesightError> {
        let (task, _summary) = self.dispatcher.run_round(now).await?;
        Ok(task)
    }

    /// Fill in the observed value of the earliest pending task, if it is
    /// due. Returns the task when its value was stored.
    pub async fn backfill_step(&self, now: u64) -> Result<Option<Task>, ForesightError> {
        let Some(mut task) = self.store.next_pending_task().await? else {
            tracing::trace!("No pending tasks");
            return Ok(None);
        };
        if task.timestamp > now {
            tracing::trace!("Earliest pending task {} is not due yet", task.timestamp);
            return Ok(None);
        }

        let Some(value) = self
            .oracle
            .fetch_observed_value(&task.category, &task.instrument, task.timestamp)
            .await
        else {
            let mut stall = self.backfill_stall.lock().await;
            if stall.0 == task.timestamp {
                stall.1 = stall.1.saturating_add(1);
            } else {
                *stall = (task.timestamp, 1);
            }
            if stall.1 % BACKFILL_STALL_WARN_AFTER == 0 {
                tracing::warn!(
                    "No observed value for {}/{} at {} after {} attempts; later tasks are waiting on it",
                    task.category,
                    task.instrument,
                    task.timestamp,
                    stall.1
                );
            }
            return Ok(None);
        };
        *self.backfill_stall.lock().await = (0, 0);

        let stored = self
            .store
            .set_observed_value(task.timestamp, &task.category, &task.instrument, value)
            .await?;
        if !stored {
            return Ok(None);
        }

        tracing::info!(
            "Observed {}/{} at {}: {}",
            task.category,
            task.instrument,
            task.timestamp,
            value
        );
        task.observed_value = Some(value);
        Ok(Some(task))
    }

    pub async fn scoring_step(&self, now: u64) -> Result<(), ForesightError> {
        self.submitter.run_cycle(now).await.map(|_| ())
    }
}

/// Drive `step` under `pacer` until shutdown, logging failed iterations.
async fn run_paced<F, Fut>(name: &'static str, mut pacer: Pacer, mut step: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), ForesightError>>,
{
    tracing::debug!("{} loop running every {:?}", name, pacer.period());
    while !pacer.is_shutdown() {
        let started = Instant::now();
        match step().await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                tracing::error!("{} iteration failed and will keep failing until fixed: {}", name, e)
            }
            Err(e) => tracing::warn!("{} iteration failed: {}", name, e),
        }
        if !pacer.wait_from(started).await {
            break;
        }
    }
    tracing::info!("{} loop exiting", name);
}
