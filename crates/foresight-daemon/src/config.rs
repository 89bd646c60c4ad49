// crates/foresight-daemon/src/config.rs
//
// Runtime configuration for the Foresight validator daemon.
// Loaded from a TOML file or populated with sensible defaults.

use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use serde::Deserialize;

use foresight_core::error::ForesightError;
use foresight_scoring::ScoringSettings;
use foresight_validator::{DispatchSettings, LoopSettings};

/// Runtime configuration for the validator.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    /// Directory for local data storage (RocksDB).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Name of the subnet to validate.
    #[serde(default = "default_subnet_name")]
    pub subnet_name: String,

    /// This validator's ledger identity key. Can be overridden with `--identity`.
    #[serde(default)]
    pub validator_identity: Option<String>,

    /// Endpoint of the ledger gateway.
    #[serde(default)]
    pub ledger_url: Option<String>,

    /// OHLC market data endpoint used for observed values.
    #[serde(default = "default_market_data_url")]
    pub market_data_url: String,

    /// Seconds between dispatch rounds.
    #[serde(default = "default_iteration_interval_secs")]
    pub iteration_interval_secs: u64,

    /// Seconds between truth-backfill attempts.
    #[serde(default = "default_get_real_data_interval_secs")]
    pub get_real_data_interval_secs: u64,

    /// Length of the scoring window, and the period of the scoring loop.
    #[serde(default = "default_weighting_period_secs")]
    pub weighting_period_secs: u64,

    /// Extra seconds added to the back of the scoring window.
    #[serde(default = "default_scoring_grace_secs")]
    pub scoring_grace_secs: u64,

    /// Per-peer answer deadline.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Request timeout for market data calls.
    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,

    /// Request timeout for ledger gateway calls.
    #[serde(default = "default_ledger_timeout_secs")]
    pub ledger_timeout_secs: u64,

    /// Latest task timestamp, in seconds ahead of creation.
    #[serde(default = "default_horizon_secs")]
    pub horizon_secs: u64,

    /// Earliest task timestamp, in seconds ahead of creation.
    #[serde(default = "default_min_lead_secs")]
    pub min_lead_secs: u64,

    /// Ceiling of the integer weight scale.
    #[serde(default = "default_max_allowed_weights")]
    pub max_allowed_weights: u16,

    /// Multiplier applied to a peer's mean error for each missed answer.
    #[serde(default = "default_missing_penalty")]
    pub missing_penalty: f64,

    /// Steepness of the score normalization curve.
    #[serde(default = "default_sigmoid_steepness")]
    pub sigmoid_steepness: f64,

    /// JSON catalog of `{category: [instrument, ...]}`. When unset every
    /// task is crypto/BTCUSDT.
    #[serde(default)]
    pub categories_file: Option<String>,

    /// Extra instrument -> market data pair mappings.
    #[serde(default)]
    pub symbol_overrides: HashMap<String, String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> String {
    "~/.foresight/data".to_string()
}

fn default_subnet_name() -> String {
    "prediction".to_string()
}

fn default_market_data_url() -> String {
    foresight_oracle::kraken::DEFAULT_OHLC_URL.to_string()
}

fn default_iteration_interval_secs() -> u64 {
    60
}

fn default_get_real_data_interval_secs() -> u64 {
    60
}

fn default_weighting_period_secs() -> u64 {
    3600
}

fn default_scoring_grace_secs() -> u64 {
    180
}

fn default_call_timeout_secs() -> u64 {
    65
}

fn default_oracle_timeout_secs() -> u64 {
    30
}

fn default_ledger_timeout_secs() -> u64 {
    30
}

fn default_horizon_secs() -> u64 {
    8 * 3600
}

fn default_min_lead_secs() -> u64 {
    60
}

fn default_max_allowed_weights() -> u16 {
    800
}

fn default_missing_penalty() -> f64 {
    5.0
}

fn default_sigmoid_steepness() -> f64 {
    10.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            subnet_name: default_subnet_name(),
            validator_identity: None,
            ledger_url: None,
            market_data_url: default_market_data_url(),
            iteration_interval_secs: default_iteration_interval_secs(),
            get_real_data_interval_secs: default_get_real_data_interval_secs(),
            weighting_period_secs: default_weighting_period_secs(),
            scoring_grace_secs: default_scoring_grace_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            oracle_timeout_secs: default_oracle_timeout_secs(),
            ledger_timeout_secs: default_ledger_timeout_secs(),
            horizon_secs: default_horizon_secs(),
            min_lead_secs: default_min_lead_secs(),
            max_allowed_weights: default_max_allowed_weights(),
            missing_penalty: default_missing_penalty(),
            sigmoid_steepness: default_sigmoid_steepness(),
            categories_file: None,
            symbol_overrides: HashMap::new(),
            log_level: default_log_level(),
        }
    }
}

impl ValidatorConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: ValidatorConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Reject values the loops cannot run with.
    pub fn validate(&self) -> Result<(), ForesightError> {
        let periods = [
            ("iteration_interval_secs", self.iteration_interval_secs),
            ("get_real_data_interval_secs", self.get_real_data_interval_secs),
            ("weighting_period_secs", self.weighting_period_secs),
            ("call_timeout_secs", self.call_timeout_secs),
            ("oracle_timeout_secs", self.oracle_timeout_secs),
            ("ledger_timeout_secs", self.ledger_timeout_secs),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(ForesightError::Configuration(format!("{} must be positive", name)));
            }
        }
        if self.max_allowed_weights == 0 {
            return Err(ForesightError::Configuration(
                "max_allowed_weights must be positive".to_string(),
            ));
        }
        if self.min_lead_secs > self.horizon_secs {
            return Err(ForesightError::Configuration(format!(
                "min_lead_secs ({}) exceeds horizon_secs ({})",
                self.min_lead_secs, self.horizon_secs
            )));
        }
        if !self.missing_penalty.is_finite() || self.missing_penalty < 0.0 {
            return Err(ForesightError::Configuration(
                "missing_penalty must be a non-negative number".to_string(),
            ));
        }
        if !self.sigmoid_steepness.is_finite() || self.sigmoid_steepness <= 0.0 {
            return Err(ForesightError::Configuration(
                "sigmoid_steepness must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            min_lead_secs: self.min_lead_secs,
            horizon_secs: self.horizon_secs,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }

    pub fn scoring_settings(&self) -> ScoringSettings {
        ScoringSettings {
            max_allowed_weights: self.max_allowed_weights,
            missing_penalty: self.missing_penalty,
            sigmoid_steepness: self.sigmoid_steepness,
            ..ScoringSettings::default()
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            iteration_interval: Duration::from_secs(self.iteration_interval_secs),
            real_data_interval: Duration::from_secs(self.get_real_data_interval_secs),
            weighting_period: Duration::from_secs(self.weighting_period_secs),
        }
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger_timeout_secs)
    }
}
