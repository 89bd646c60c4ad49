// crates/foresight-oracle/src/symbols.rs
//
// Canonical instrument symbol -> provider pair code.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Lookup table from the symbols peers are asked about (e.g. `BTCUSDT`)
/// to the market-data provider's pair codes (e.g. `XXBTZUSD`).
///
/// Symbols without an entry are sent to the provider unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    pairs: HashMap<String, String>,
}

impl SymbolTable {
    /// An empty table: every symbol passes through unchanged.
    pub fn empty() -> Self {
        Self {
            pairs: HashMap::new(),
        }
    }

    /// Add or replace one mapping.
    pub fn insert(&mut self, symbol: impl Into<String>, pair: impl Into<String>) {
        self.pairs.insert(symbol.into(), pair.into());
    }

    /// The default table extended (and overridden) by `overrides`.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut table = Self::default();
        for (symbol, pair) in overrides {
            table.insert(symbol.clone(), pair.clone());
        }
        table
    }

    /// Provider pair code for `symbol`.
    pub fn resolve<'a>(&'a self, symbol: &'a str) -> &'a str {
        self.pairs.get(symbol).map(String::as_str).unwrap_or(symbol)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.insert("BTCUSDT", "XXBTZUSD");
        table.insert("ETHUSDT", "XETHZUSD");
        table
    }
}
