// crates/foresight-validator/src/pacing.rs
//
// Drift-corrected loop pacing.
//
// A loop that sleeps a full period after each iteration slowly falls behind
// by the time its work takes. `Pacer` measures when the iteration started
// and sleeps only what is left of the period (nothing, if the work
// overran). The sleep ends early when shutdown is requested.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

pub struct Pacer {
    period: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Pacer {
    /// `shutdown` flips to `true` when the loop should stop. A dropped
    /// sender counts as shutdown.
    pub fn new(period: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self { period, shutdown }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time left in the period after `elapsed` of work.
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.period.saturating_sub(elapsed)
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Sleep out the rest of the period that began at `started`.
    ///
    /// Returns `false` if shutdown was requested before or during the
    /// sleep, `true` when the loop should run its next iteration.
    pub async fn wait_from(&mut self, started: Instant) -> bool {
        if self.is_shutdown() {
            return false;
        }

        let sleep = tokio::time::sleep(self.remaining(started.elapsed()));
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return !self.is_shutdown(),
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        return false;
                    }
                }
            }
        }
    }
}
