//! # voxrag CLI (`vrag`)
//!
//! ## Usage
//!
//! ```bash
//! vrag --config ./config/voxrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vrag init` | Create the SQLite database and run schema migrations |
//! | `vrag add <name> <location>` | Register a data source and wait for processing |
//! | `vrag sources` | List data sources and their status |
//! | `vrag stores` | List vector stores |
//! | `vrag retry <id>` | Re-run processing for a data source |
//! | `vrag delete <id>` | Remove a data source and its collection |
//! | `vrag query <store-id> "<text>"` | Retrieve context for a query |
//! | `vrag peek <store-id>` | Show a collection's count and a sample |

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use voxrag::commands;
use voxrag::config::{self, Config};
use voxrag_core::models::DataSourceKind;
use voxrag::logging;

const DEFAULT_CONFIG: &str = "./config/voxrag.toml";

/// voxrag: a retrieval-augmented context engine that tolerates
/// speech-to-text misspellings.
#[derive(Parser)]
#[command(name = "vrag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the default path does not exist, built-in defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Register a data source and process it.
    Add {
        /// Human-readable name.
        name: String,
        /// Path (file or directory), URL, or connection string.
        location: String,
        /// Source kind; inferred from the filesystem when omitted.
        #[arg(long, value_parser = parse_kind)]
        kind: Option<DataSourceKind>,
        /// Seconds to wait for processing to settle.
        #[arg(long, default_value_t = 600)]
        wait_secs: u64,
    },

    /// List data sources.
    Sources,

    /// List vector stores.
    Stores,

    /// Reset a data source and run its pipeline again.
    Retry {
        id: String,
        #[arg(long, default_value_t = 600)]
        wait_secs: u64,
    },

    /// Delete a data source, its vector store, and its collection.
    Delete { id: String },

    /// Retrieve context for a query from one vector store.
    Query {
        /// Vector store id (see `vrag stores`).
        store: String,
        /// Natural-language query.
        text: String,
    },

    /// Print a collection's record count and up to 10 sample records.
    Peek {
        /// Vector store id (see `vrag stores`).
        store: String,
    },
}

fn parse_kind(s: &str) -> Result<DataSourceKind, String> {
    s.parse::<DataSourceKind>().map_err(|e| e.to_string())
}

fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        let cfg = Config::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    config::load_config(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load(&cli.config)?;
    logging::init(&cfg.logging.level);

    if let Commands::Init = cli.command {
        return commands::run_init(&cfg).await;
    }

    let service = commands::open_service(&cfg).await?;

    match cli.command {
        Commands::Init => {}
        Commands::Add {
            name,
            location,
            kind,
            wait_secs,
        } => {
            commands::run_add(&service, name, location, kind, Duration::from_secs(wait_secs))
                .await?;
        }
        Commands::Sources => commands::list_sources(&service),
        Commands::Stores => commands::list_stores(&service),
        Commands::Retry { id, wait_secs } => {
            commands::run_retry(&service, &id, Duration::from_secs(wait_secs)).await?;
        }
        Commands::Delete { id } => commands::run_delete(&service, &id).await?,
        Commands::Query { store, text } => commands::run_query(&service, &store, &text).await?,
        Commands::Peek { store } => commands::run_peek(&service, &store).await?,
    }

    Ok(())
}
