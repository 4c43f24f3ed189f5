//! # Vector Sync CLI (`vsync`)
//!
//! ## Usage
//!
//! ```bash
//! vsync --config ./config/vsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vsync init` | Create the SQLite database and run schema migrations |
//! | `vsync upsert <file>` | Upsert one context item from JSON (`-` for stdin) |
//! | `vsync import <file>` | Bulk import `{ "items": [...] }` (`-` for stdin) |
//! | `vsync export` | Send a batch of published records to the endpoint |
//! | `vsync get <id>` | Show a record by UUID |
//! | `vsync publish <id>` | Make a record eligible for export |
//! | `vsync unpublish <id>` | Exclude a record from export |
//! | `vsync serve` | Start the HTTP server |
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vector_sync::{config, export, get, ingest, migrate, server};

/// Vector Sync CLI: fingerprint-keyed context upsert and batch export to a
/// vector-indexing service.
#[derive(Parser)]
#[command(
    name = "vsync",
    about = "Vector Sync: fingerprint-keyed context upsert and batch export",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Upsert a single context item.
    ///
    /// Reads `{ "title", "description", "tags", "agents" }`. Items with the
    /// same fingerprint update the existing record instead of duplicating it.
    Upsert {
        /// JSON file, or `-` for stdin.
        file: PathBuf,
    },

    /// Bulk import context items.
    ///
    /// Reads `{ "items": [{ "title", "text", "tags", "agents" }, ...] }` and
    /// reports how many records were created and updated.
    Import {
        /// JSON file, or `-` for stdin.
        file: PathBuf,
    },

    /// Send published context records to the configured endpoint.
    Export {
        /// Maximum number of records to send (defaults to `sync.batch_size`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a context record by UUID.
    Get {
        /// Record UUID.
        id: String,
    },

    /// Mark a record as published.
    Publish {
        /// Record UUID.
        id: String,
    },

    /// Mark a record as unpublished.
    Unpublish {
        /// Record UUID.
        id: String,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upsert { file } => {
            ingest::run_upsert(&cfg, &file).await?;
        }
        Commands::Import { file } => {
            ingest::run_import(&cfg, &file).await?;
        }
        Commands::Export { limit } => {
            export::run_export(&cfg, limit).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::Publish { id } => {
            get::run_set_published(&cfg, &id, true).await?;
        }
        Commands::Unpublish { id } => {
            get::run_set_published(&cfg, &id, false).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
