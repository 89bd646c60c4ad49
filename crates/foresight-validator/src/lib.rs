// crates/foresight-validator/src/lib.rs
//
// foresight-validator: The validator engine.
//
// Resolves the subnet's peers, issues forecasting tasks to all of them
// concurrently, backfills observed values once tasks come due, and turns the
// scoring window into weight submissions. Three drift-corrected loops drive
// all of it under one shutdown signal.

pub mod directory;
pub mod dispatcher;
pub mod orchestrator;
pub mod pacing;
pub mod selection;
pub mod submit;

#[cfg(test)]
mod test_support;

pub use directory::PeerDirectory;
pub use dispatcher::{DispatchSettings, Dispatcher, PollSummary};
pub use orchestrator::{unix_now, LoopSettings, Orchestrator};
pub use pacing::Pacer;
pub use selection::{CatalogSelector, FixedSelector};
pub use submit::{SubmissionReport, WeightSubmitter};
