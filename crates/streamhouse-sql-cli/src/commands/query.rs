//! One-shot statement execution
//!
//! ## Examples
//!
//! ```bash
//! # Current state of a bounded query
//! streamsql query "SELECT * FROM orders WHERE amount > 100"
//!
//! # Every change event, as CSV
//! streamsql query "SELECT region, COUNT(*) FROM orders GROUP BY region" --changelog --format csv
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use streamhouse_sql_client::{FetchState, RestStore, ResultFetcher};
use tracing::debug;

use crate::config::{Config, OutputFormat};
use crate::format::Formatter;

/// Execute `sql`, fetch pages until the stream is exhausted or stalls,
/// and print the active view followed by a `(N rows, state)` footer
pub async fn run_query(
    store: Arc<RestStore>,
    config: &Config,
    sql: &str,
    format: OutputFormat,
    changelog: bool,
) -> Result<()> {
    let statement = store
        .execute_statement(sql)
        .await
        .context("Failed to execute statement")?;
    let name = statement.name.clone();

    let fetcher = ResultFetcher::new(store, config.results.clone());
    fetcher.init(statement).await;
    if changelog {
        fetcher.results().set_mode(false);
    }

    let fetched = fetcher.jump_to_last_page().await;
    debug!(statement = %name, rows = fetched, "Drained statement results");

    let results = fetcher.results();
    Formatter::new(format, config.colored).print_results(&results)?;

    let state = fetcher.state();
    eprintln!();
    eprintln!("({} rows, {})", results.size(), state);

    if let Some(deletion) = fetcher.close().await {
        // keep the runtime alive until the delete request has been sent
        let _ = deletion.await;
    }

    if state == FetchState::Failed {
        anyhow::bail!("Failed to fetch all results for statement '{}'", name);
    }
    Ok(())
}
