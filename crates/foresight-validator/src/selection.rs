// crates/foresight-validator/src/selection.rs
//
// Task selection strategies: what each new task asks peers to forecast.

use std::collections::BTreeMap;
use std::fs;

use rand::seq::SliceRandom;

use foresight_core::error::ForesightError;
use foresight_core::traits::TaskSelector;

/// Always the same (category, instrument).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedSelector {
    pub category: String,
    pub instrument: String,
}

impl FixedSelector {
    pub fn new(category: &str, instrument: &str) -> Self {
        Self {
            category: category.to_string(),
            instrument: instrument.to_string(),
        }
    }
}

impl Default for FixedSelector {
    fn default() -> Self {
        Self::new("crypto", "BTCUSDT")
    }
}

impl TaskSelector for FixedSelector {
    fn select(&self) -> (String, String) {
        (self.category.clone(), self.instrument.clone())
    }
}

/// Picks a category uniformly at random, then an instrument within it.
///
/// The catalog is a JSON object of category -> instrument list:
///
/// ```json
/// {"crypto": ["BTCUSDT", "ETHUSDT"], "forex": ["EURUSD"]}
/// ```
#[derive(Debug, Clone)]
pub struct CatalogSelector {
    categories: Vec<(String, Vec<String>)>,
}

impl CatalogSelector {
    /// Build from a parsed catalog. Categories with no instruments are
    /// ignored; a catalog with nothing left is a configuration error.
    pub fn from_catalog(catalog: BTreeMap<String, Vec<String>>) -> Result<Self, ForesightError> {
        let categories: Vec<(String, Vec<String>)> = catalog
            .into_iter()
            .filter(|(_, instruments)| !instruments.is_empty())
            .collect();

        if categories.is_empty() {
            return Err(ForesightError::Configuration(
                "task catalog has no instruments".to_string(),
            ));
        }
        Ok(Self { categories })
    }

    /// Load the catalog from a JSON file.
    pub fn load(path: &str) -> Result<Self, ForesightError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ForesightError::Configuration(format!("cannot read task catalog {}: {}", path, e))
        })?;
        let catalog: BTreeMap<String, Vec<String>> = serde_json::from_str(&contents).map_err(|e| {
            ForesightError::Configuration(format!("invalid task catalog {}: {}", path, e))
        })?;
        let selector = Self::from_catalog(catalog)?;
        tracing::info!(
            "Loaded task catalog from {} ({} categories)",
            path,
            selector.categories.len()
        );
        Ok(selector)
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }
}

impl TaskSelector for CatalogSelector {
    fn select(&self) -> (String, String) {
        let mut rng = rand::thread_rng();
        // Both lists are non-empty after `from_catalog`.
        match self.categories.choose(&mut rng) {
            Some((category, instruments)) => {
                let instrument = instruments.choose(&mut rng).cloned().unwrap_or_default();
                (category.clone(), instrument)
            }
            None => FixedSelector::default().select(),
        }
    }
}
