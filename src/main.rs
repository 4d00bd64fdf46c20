//! # repo-context CLI (`rctx`)
//!
//! ## Usage
//!
//! ```bash
//! rctx --config ./config/rctx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rctx load` | Fetch the corpus and report how many documents it holds |
//! | `rctx search "<query>"` | Print the top-K matches |
//! | `rctx get <id>` | Print one document verbatim |
//! | `rctx serve` | Start the HTTP server |
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use repo_context::{config, corpus, get, loader, search, server};

/// repo-context — top-K textual search over a code corpus, one-shot or live.
#[derive(Parser)]
#[command(
    name = "rctx",
    about = "repo-context — top-K textual search over a code corpus, one-shot or live",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rctx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the corpus and print its size.
    ///
    /// For archive and git sources this also populates the on-disk cache,
    /// so a later `serve` starts without downloading.
    Load,

    /// Search the corpus.
    Search {
        /// The search query string.
        query: String,

        /// Number of matches to return (defaults to `[retrieval].top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Print a document by id (its path relative to the corpus root).
    Get {
        id: String,
    },

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind`.
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
        Commands::Load => {
            let store = corpus::CorpusStore::new(loader::loader_from_config(&cfg)?);
            store.ensure_loaded().await?;
            println!("Loaded {} documents.", store.len());
        }
        Commands::Search { query, k } => {
            search::run_search(&cfg, &query, k).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
