// crates/foresight-daemon/src/main.rs
//
// Binary entrypoint for the Foresight validator daemon.
//
// Parses CLI arguments, loads configuration, initializes tracing, opens the
// task store, wires the ledger / peer / market-data clients, verifies the
// validator is registered in its subnet, and runs the validator loops until
// Ctrl-C.

mod config;

use std::sync::Arc;

use clap::Parser;
use config::ValidatorConfig;
use tokio::sync::watch;

use foresight_client::{HttpLedgerClient, HttpPeerRpc};
use foresight_core::error::ForesightError;
use foresight_core::traits::{LedgerClient, TaskSelector, TaskStore};
use foresight_oracle::{KrakenOracle, SymbolTable};
use foresight_store::RocksStore;
use foresight_validator::{
    unix_now, CatalogSelector, Dispatcher, FixedSelector, Orchestrator, PeerDirectory,
    WeightSubmitter,
};

/// Foresight validator: issues forecasting tasks, scores peers, and submits weights.
#[derive(Parser, Debug)]
#[command(name = "foresight-daemon", version = "0.1.0", about = "Foresight prediction validator")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.foresight/config.toml")]
    config: String,

    /// Validator identity key (overrides `validator_identity` in the config).
    #[arg(long)]
    identity: Option<String>,

    /// Run one dispatch round, one backfill step and one scoring cycle, then exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = expand_tilde(&args.config);
    let loaded = ValidatorConfig::load(&config_path);
    let mut config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => ValidatorConfig::default(),
    };

    // Initialize tracing subscriber for structured logging. RUST_LOG wins
    // over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    match &loaded {
        Ok(_) => tracing::info!("Loaded configuration from {}", config_path),
        Err(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            config_path,
            e
        ),
    }

    // CLI --identity flag overrides the config file value.
    if let Some(identity) = args.identity {
        config.validator_identity = Some(identity);
    }
    config.validate()?;

    let identity = config.validator_identity.clone().ok_or_else(|| {
        ForesightError::Configuration(
            "no validator identity (set validator_identity or pass --identity)".to_string(),
        )
    })?;
    let ledger_url = config
        .ledger_url
        .clone()
        .ok_or_else(|| ForesightError::Configuration("ledger_url is not set".to_string()))?;

    tracing::info!("Foresight validator v0.1.0");
    tracing::info!("Identity: {}", identity);
    tracing::info!("Subnet: {}", config.subnet_name);
    tracing::info!("Ledger gateway: {}", ledger_url);
    tracing::info!("Market data: {}", config.market_data_url);
    tracing::info!("Data directory: {}", config.data_dir);

    // ---------------------------------------------------------------
    // Storage
    // ---------------------------------------------------------------
    let data_dir = expand_tilde(&config.data_dir);
    std::fs::create_dir_all(&data_dir)?;
    let db_path = format!("{}/validator_rocksdb", data_dir);
    let store = Arc::new(RocksStore::open(&db_path)?);
    store.create_schema().await?;
    tracing::info!(
        "Task store opened at {} ({} tasks awaiting observed values)",
        db_path,
        store.pending_count()?
    );
    let store: Arc<dyn TaskStore> = store;

    // ---------------------------------------------------------------
    // Collaborators
    // ---------------------------------------------------------------
    let ledger: Arc<dyn LedgerClient> =
        Arc::new(HttpLedgerClient::new(&ledger_url, config.ledger_timeout()));
    let oracle = Arc::new(KrakenOracle::new(
        &config.market_data_url,
        SymbolTable::with_overrides(&config.symbol_overrides),
        config.oracle_timeout(),
    ));
    let rpc = Arc::new(HttpPeerRpc::new(&identity));
    let selector: Arc<dyn TaskSelector> = match &config.categories_file {
        Some(path) => Arc::new(CatalogSelector::load(&expand_tilde(path))?),
        None => Arc::new(FixedSelector::default()),
    };

    // Subnet and registration problems are fatal at startup.
    let directory = PeerDirectory::new(ledger.clone(), &identity);
    let subnet_id = directory.resolve_subnet(&config.subnet_name).await?;
    let uid = directory.ensure_registered(subnet_id).await?;
    tracing::info!("Registered in subnet {} as uid {}", subnet_id, uid);

    let dispatcher = Dispatcher::new(
        store.clone(),
        directory.clone(),
        rpc,
        selector,
        subnet_id,
        config.dispatch_settings(),
    );
    let submitter = WeightSubmitter::new(
        store.clone(),
        ledger,
        directory,
        subnet_id,
        config.scoring_settings(),
        config.weighting_period_secs,
        config.scoring_grace_secs,
    );
    let orchestrator = Arc::new(Orchestrator::new(
        store,
        oracle,
        dispatcher,
        submitter,
        config.loop_settings(),
    ));

    if args.once {
        orchestrator.run_once(unix_now()).await;
        tracing::info!("Single pass complete");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
        }
        let _ = shutdown_tx.send(true);
    });

    orchestrator.run(shutdown_rx).await;
    tracing::info!("Foresight validator stopped");
    Ok(())
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
