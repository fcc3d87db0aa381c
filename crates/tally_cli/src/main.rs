//! TALLY CLI
//!
//! Store and read values, replay recorded call history, and fetch pages
//! through the expiring cache.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use config::TallyConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tally_cache::{HistoryReplayer, STORE_IDENTITY, ValueCache};
use tally_core::{StoredValue, SystemClock, ValueKey, ValueKind};
use tally_fetch::{ExpiringFetchCache, HttpFetcher, access_count};
use tally_storage::SharedStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "TALLY - instrumented key-value cache with replayable history", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Database file, overriding the configured path
    #[arg(long, global = true)]
    db: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value under a fresh key
    Store {
        /// Value to store
        value: String,
        /// How to interpret the value: text, int, float or bytes
        #[arg(short, long, default_value = "text")]
        kind: ValueKind,
    },
    /// Read a stored value
    Get {
        /// Key printed by `store`
        key: ValueKey,
        /// Coerce to text, int or float instead of printing raw bytes
        #[arg(short = 'a', long = "as")]
        as_kind: Option<ValueKind>,
    },
    /// Print the recorded call history of an operation
    Replay {
        /// Operation identity
        #[arg(default_value = STORE_IDENTITY)]
        identity: String,
        /// Print the transcript as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch a URL through the expiring cache
    Fetch {
        /// URL to fetch
        url: String,
    },
    /// Show how many times a URL was requested
    Count {
        /// URL to inspect
        url: String,
    },
    /// Remove every key from the store
    Flush,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let mut config = TallyConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let store = config
        .store
        .open(Arc::new(SystemClock))
        .wrap_err("failed to open the store; pass --db to use a different file")?;
    run(cli.command, store, &config)
}

fn run(command: Commands, store: SharedStore, config: &TallyConfig) -> Result<()> {
    match command {
        Commands::Store { value, kind } => {
            let value = StoredValue::decode(value.into_bytes(), kind)?;
            let key = ValueCache::new(store).store(value)?;
            println!("{}", key);
        }
        Commands::Get { key, as_kind } => {
            let cache = ValueCache::new(store);
            let rendered = match as_kind {
                None | Some(ValueKind::Bytes) => cache
                    .retrieve(&key)?
                    .map(|raw| String::from_utf8_lossy(&raw).into_owned()),
                Some(ValueKind::Text) => cache.get_str(&key)?,
                Some(ValueKind::Integer) => cache.get_int(&key)?.map(|n| n.to_string()),
                Some(ValueKind::Float) => cache.get_float(&key)?.map(|x| x.to_string()),
            };
            println!("{}", rendered.as_deref().unwrap_or("(nil)"));
        }
        Commands::Replay { identity, json } => {
            let transcript = HistoryReplayer::new(store).replay(&identity)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&transcript)?);
            } else {
                println!("{}", transcript);
            }
            if transcript.unmatched_inputs > 0 {
                tracing::warn!(
                    operation = %identity,
                    unmatched = transcript.unmatched_inputs,
                    "some calls have no recorded output"
                );
            }
        }
        Commands::Fetch { url } => {
            let fetcher = HttpFetcher::new(config.fetch.request_timeout())?;
            let cache = ExpiringFetchCache::new(store, fetcher).with_config(config.fetch.clone())?;
            let content = cache.fetch(&url)?;
            println!("{}", content);
        }
        Commands::Count { url } => {
            println!("{}", access_count(store.as_ref(), &url)?);
        }
        Commands::Flush => {
            store.flush()?;
            tracing::info!("store flushed");
        }
    }
    Ok(())
}
