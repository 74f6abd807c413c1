//! # Catalog Store CLI (`catalog`)
//!
//! Command-line front end for the catalog: initialize storage, add and
//! query items, check consistency, and run the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! catalog --config ./config/catalog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `catalog init` | Create the database (or JSON file directory) and blob root |
//! | `catalog add --name <n> --category <c> --image <file>` | Add an item |
//! | `catalog list` | List all items in insertion order |
//! | `catalog get <id>` | Show one item |
//! | `catalog search <keyword>` | Case-insensitive name search |
//! | `catalog delete <id>` | Delete an item (and its image if unshared) |
//! | `catalog categories` | List categories |
//! | `catalog check` | Report dangling items and orphan images |
//! | `catalog serve` | Start the HTTP server |
//!
//! Diagnostics go to stderr through `tracing`; set `RUST_LOG=debug` for
//! more detail.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use catalog_store::{commands, config, migrate, server};

/// Catalog Store CLI: items, categories, and deduplicated images.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/catalog.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "catalog",
    about = "Catalog Store: durable items with normalized categories and content-addressed images",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/catalog.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize storage.
    ///
    /// Creates the SQLite database and schema (or the JSON file's
    /// directory) and the blob root. Idempotent.
    Init,

    /// Add an item with an image file.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        /// Image file to upload.
        #[arg(long)]
        image: PathBuf,
    },

    /// List all items.
    List,

    /// Show one item by id.
    Get { id: i64 },

    /// Search item names, ignoring case.
    Search { keyword: String },

    /// Delete an item by id.
    Delete { id: i64 },

    /// List categories.
    Categories,

    /// Cross-check items against stored images. Exits non-zero on problems.
    Check,

    /// Start the HTTP server on `[server].bind`.
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
            println!("Catalog initialized successfully.");
        }
        Commands::Add {
            name,
            category,
            image,
        } => {
            commands::run_add(&cfg, &name, &category, &image).await?;
        }
        Commands::List => {
            commands::run_list(&cfg).await?;
        }
        Commands::Get { id } => {
            commands::run_get(&cfg, id).await?;
        }
        Commands::Search { keyword } => {
            commands::run_search(&cfg, &keyword).await?;
        }
        Commands::Delete { id } => {
            commands::run_delete(&cfg, id).await?;
        }
        Commands::Categories => {
            commands::run_categories(&cfg).await?;
        }
        Commands::Check => {
            commands::run_check(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
