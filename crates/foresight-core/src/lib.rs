// crates/foresight-core/src/lib.rs
//
// foresight-core: Core types, traits, and error taxonomy for the Foresight
// prediction validator.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines forecasting tasks and peer answers, the peer directory entry
// types, address parsing, and the collaborator traits (store, ledger, peer
// RPC, truth oracle, task selection) that the validator engine is wired
// against.

pub mod address;
pub mod error;
pub mod peer;
pub mod task;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use foresight_core::Task;`

pub use address::extract_address;
pub use error::ForesightError;
pub use peer::{PeerAddress, PeerInfo};
pub use task::{Answer, ForecastRequest, ScoredAnswer, Task, NO_ANSWER};
pub use traits::{LedgerClient, PeerRpc, TaskSelector, TaskStore, TruthOracle};
