//! Implementations behind the `vrag` subcommands.
//!
//! Each function prints human-readable output to stdout; diagnostics go
//! through `tracing` to stderr.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use voxrag_core::models::{DataSource, DataSourceDescriptor, DataSourceKind, RetrievalPath};

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::loader::resolve_location;
use crate::migrate;
use crate::service::RagService;
use crate::sqlite_config_store::SqliteConfigStore;
use crate::sqlite_store::SqliteVectorStore;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Open the database, run migrations, and build the service on SQLite stores.
pub async fn open_service(config: &Config) -> Result<Arc<RagService>> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    let provider = create_provider(&config.embedding)?;

    let service = RagService::open(
        config.clone(),
        Arc::new(SqliteConfigStore::new(pool.clone())),
        Arc::new(SqliteVectorStore::new(pool)),
        provider,
    )
    .await
    .context("Failed to load data sources")?;
    Ok(service)
}

pub async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("Database initialized at {}", config.db.path.display());
    Ok(())
}

/// `file` for a path to a file, `directory` for a directory, else an error.
pub fn infer_kind(config: &Config, location: &str) -> Result<DataSourceKind> {
    let path = resolve_location(location, &config.loader);
    if path.is_dir() {
        Ok(DataSourceKind::Directory)
    } else if path.is_file() {
        Ok(DataSourceKind::File)
    } else {
        anyhow::bail!(
            "{} does not exist; pass --kind for non-filesystem sources",
            path.display()
        )
    }
}

pub async fn run_add(
    service: &Arc<RagService>,
    name: String,
    location: String,
    kind: Option<DataSourceKind>,
    wait: Duration,
) -> Result<()> {
    let kind = match kind {
        Some(kind) => kind,
        None => infer_kind(service.config(), &location)?,
    };
    let source = service
        .create_data_source(DataSourceDescriptor {
            name,
            kind,
            location,
            credentials: Default::default(),
        })
        .await?;
    println!("Created data source {} ({})", source.id, source.kind);

    let settled = service
        .wait_until_settled(&source.id, POLL_INTERVAL, wait)
        .await?;
    print_outcome(service, &settled);
    Ok(())
}

pub async fn run_retry(service: &Arc<RagService>, id: &str, wait: Duration) -> Result<()> {
    if !service.retry_data_source_processing(id).await? {
        anyhow::bail!("Data source {} not found or already processing", id);
    }
    let settled = service.wait_until_settled(id, POLL_INTERVAL, wait).await?;
    print_outcome(service, &settled);
    Ok(())
}

fn print_outcome(service: &RagService, source: &DataSource) {
    match &source.error_message {
        Some(message) => println!("Data source {}: {} ({})", source.id, source.status, message),
        None => println!(
            "Data source {}: {} ({} chunks)",
            source.id, source.status, source.document_count
        ),
    }
    if let Some(store) = service.vector_store_for_source(&source.id) {
        println!("Vector store {}: {}", store.id, store.status);
    }
}

pub async fn run_delete(service: &Arc<RagService>, id: &str) -> Result<()> {
    if service.delete_data_source(id).await? {
        println!("Deleted data source {}", id);
    } else {
        anyhow::bail!("Data source {} not found", id);
    }
    Ok(())
}

pub fn list_sources(service: &RagService) {
    let sources = service.list_data_sources();
    if sources.is_empty() {
        println!("No data sources.");
        return;
    }
    println!(
        "{:<36}  {:<20} {:<10} {:<11} {:>7}  LOCATION",
        "ID", "NAME", "KIND", "STATUS", "CHUNKS"
    );
    for s in sources {
        println!(
            "{:<36}  {:<20} {:<10} {:<11} {:>7}  {}",
            s.id, s.name, s.kind, s.status, s.document_count, s.location
        );
        if let Some(message) = &s.error_message {
            println!("{:<38}error: {}", "", message);
        }
    }
}

pub fn list_stores(service: &RagService) {
    let stores = service.list_vector_stores();
    if stores.is_empty() {
        println!("No vector stores.");
        return;
    }
    println!(
        "{:<36}  {:<36}  {:<10} {:>8}  NAME",
        "ID", "DATA SOURCE", "STATUS", "VECTORS"
    );
    for s in stores {
        println!(
            "{:<36}  {:<36}  {:<10} {:>8}  {}",
            s.id, s.data_source_id, s.status, s.vector_count, s.name
        );
    }
}

pub async fn run_query(service: &RagService, vector_store_id: &str, query: &str) -> Result<()> {
    let results = service.retrieve_context(query, vector_store_id).await;
    if results.is_empty() {
        println!("No context found.");
        return Ok(());
    }

    for (i, chunk) in results.iter().enumerate() {
        let path = match chunk.path {
            RetrievalPath::Semantic => "semantic",
            RetrievalPath::Fuzzy => "fuzzy",
        };
        println!(
            "{}. [{:.2} {}] {} ({})",
            i + 1,
            chunk.score,
            path,
            chunk.source,
            chunk.data_source_id
        );
        for line in chunk.content.lines().take(8) {
            println!("    {}", line);
        }
        println!();
    }
    Ok(())
}

pub async fn run_peek(service: &RagService, vector_store_id: &str) -> Result<()> {
    let peek = service.peek_collection(vector_store_id).await?;
    println!("{}", serde_json::to_string_pretty(&peek)?);
    Ok(())
}
