// crates/foresight-oracle/src/lib.rs
//
// foresight-oracle: Ground-truth lookups for the Foresight prediction
// validator.
//
// Fetches the observed close price for a (category, instrument, timestamp)
// from a public OHLC market-data endpoint, translating canonical instrument
// symbols into the provider's own pair codes.

pub mod kraken;
pub mod symbols;

pub use kraken::KrakenOracle;
pub use symbols::SymbolTable;
