//! StreamHouse SQL shell (streamsql)
//!
//! Command-line client for streaming SQL statements served by the
//! StreamHouse REST API.
//!
//! ## Overview
//!
//! `streamsql` submits a statement and keeps its (possibly unbounded) result
//! stream materialized locally:
//! - **Table view**: the current state after applying updates and deletes
//! - **Changelog view**: every change event with its `+I`/`-U`/`+U`/`-D`
//!   operation
//! - **Auto-refresh**: background polling for new result pages
//!
//! ## Quick Start
//!
//! ```bash
//! # Interactive shell (default)
//! streamsql
//!
//! # One-shot query
//! streamsql query "SELECT * FROM orders" --format json
//!
//! # Point at another gateway
//! STREAMHOUSE_API_URL=http://gateway:8080 streamsql
//! ```
//!
//! ## Configuration
//!
//! Settings are read from `~/.streamhouse/sql.toml` (or `--config`);
//! command-line flags and `STREAMHOUSE_API_URL` take precedence. Logs go to
//! stderr and are filtered with `RUST_LOG` (default `warn`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use streamhouse_sql_client::{RestStore, RestStoreConfig};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod format;
mod repl;

use config::{Config, OutputFormat};

#[derive(Parser)]
#[command(name = "streamsql")]
#[command(about = "StreamHouse streaming SQL shell", long_about = None)]
struct Cli {
    /// REST API URL
    #[arg(long, env = "STREAMHOUSE_API_URL")]
    api_url: Option<String>,

    /// Config file (default: ~/.streamhouse/sql.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a statement and print all of its results
    Query {
        /// SQL statement to execute
        sql: String,
        /// Output format (default: from config)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
        /// Print the changelog instead of the current table state
        #[arg(long)]
        changelog: bool,
    },
    /// Start the interactive SQL shell
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if cli.no_color {
        config.colored = false;
    }

    let store = Arc::new(RestStore::new(RestStoreConfig::new(config.api_url.clone())));

    match cli.command {
        Some(Commands::Query {
            sql,
            format,
            changelog,
        }) => {
            let format = format.unwrap_or(config.output_format);
            commands::run_query(store, &config, &sql, format, changelog).await?;
        }
        Some(Commands::Shell) | None => {
            let mut repl = repl::Repl::new(store, &config)?;
            repl.run().await?;
        }
    }

    Ok(())
}
