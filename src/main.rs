use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use credit_ledger::application::engine::LedgerEngine;
use credit_ledger::config::EngineConfig;
use credit_ledger::domain::ports::{SharedLedgerStore, SystemClock};
use credit_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use credit_ledger::infrastructure::notify::TracingNotifier;
use credit_ledger::interfaces::csv::account_writer::AccountWriter;
use credit_ledger::interfaces::csv::replay::Replay;
use credit_ledger::telemetry;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true, env = "LEDGER_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "LEDGER_JSON_LOGS")]
    json_logs: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args)]
struct EngineArgs {
    /// Re-runs of an operation that lost a commit race.
    #[arg(long, global = true, env = "LEDGER_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Balance under which owners get a low-balance alert.
    #[arg(long, global = true, env = "LEDGER_LOW_BALANCE_THRESHOLD")]
    low_balance_threshold: Option<Decimal>,

    /// Currency of newly opened accounts.
    #[arg(long, global = true, env = "LEDGER_DEFAULT_CURRENCY")]
    currency: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply an operations CSV and print the resulting balances.
    Replay {
        /// Input operations CSV file
        input: PathBuf,

        /// Settle `process-due` payments as of this RFC 3339 instant instead of now.
        #[arg(long, env = "LEDGER_AS_OF")]
        as_of: Option<DateTime<Utc>>,
    },
    /// Settle due payments periodically until interrupted.
    Schedule {
        #[arg(long, env = "LEDGER_INTERVAL_SECS")]
        interval_secs: Option<u64>,
    },
}

impl EngineArgs {
    fn config(&self, interval_secs: Option<u64>) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(threshold) = self.low_balance_threshold {
            config.low_balance_threshold = threshold;
        }
        if let Some(currency) = &self.currency {
            config.default_currency = currency.clone();
        }
        if let Some(secs) = interval_secs {
            config.scheduler_interval = Duration::from_secs(secs);
        }
        config
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<SharedLedgerStore> {
    use credit_ledger::infrastructure::rocksdb::RocksDbLedgerStore;

    match db_path {
        Some(path) => {
            info!(path = %path.display(), "using RocksDB storage");
            Ok(Arc::new(RocksDbLedgerStore::open(path).into_diagnostic()?))
        }
        None => Ok(Arc::new(InMemoryLedgerStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<SharedLedgerStore> {
    if let Some(path) = db_path {
        tracing::warn!(
            path = %path.display(),
            "built without the storage-rocksdb feature, falling back to in-memory storage"
        );
    }
    Ok(Arc::new(InMemoryLedgerStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.json_logs);

    let store = open_store(cli.db_path)?;
    let interval_secs = match &cli.command {
        Command::Schedule { interval_secs } => *interval_secs,
        Command::Replay { .. } => None,
    };
    let engine = LedgerEngine::new(
        store,
        Arc::new(TracingNotifier),
        Arc::new(SystemClock),
        cli.engine.config(interval_secs),
    );

    match cli.command {
        Command::Replay { input, as_of } => {
            let file = File::open(input).into_diagnostic()?;
            let mut replay = Replay::new(engine, as_of);
            replay.run(file).await.into_diagnostic()?;

            let rows = replay.account_rows().await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = AccountWriter::new(stdout.lock());
            writer.write_accounts(rows).into_diagnostic()?;
        }
        Command::Schedule { .. } => {
            let handle = engine.scheduler().clone().spawn();
            tokio::signal::ctrl_c().await.into_diagnostic()?;
            info!("interrupt received, stopping scheduler");
            handle.shutdown().await;
        }
    }

    Ok(())
}
