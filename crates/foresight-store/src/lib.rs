// crates/foresight-store/src/lib.rs
//
// foresight-store: Storage layer for the Foresight prediction validator.
//
// Provides RocksDB-backed persistence of forecasting tasks (with their
// later-observed ground truth) and per-peer answers, plus the join the
// scoring engine reads.

pub mod rocks;

pub use rocks::RocksStore;
