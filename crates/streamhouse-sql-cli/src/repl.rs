//! Interactive SQL shell for streamsql
//!
//! Provides a rustyline-based interactive shell with:
//! - Command history persisted to `~/.streamhouse/sql_history`
//! - Multi-line statements terminated by `;`
//! - Backslash commands to drive result paging and the view mode

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use streamhouse_sql_client::{FetchState, RestStore, ResultFetcher};

use crate::config::{streamhouse_dir, Config};
use crate::format::Formatter;

const DEFAULT_SHOW_ROWS: usize = 20;

/// REPL context holding the store, the active fetcher and the editor
pub struct Repl {
    store: Arc<RestStore>,
    fetcher: ResultFetcher,
    formatter: Formatter,
    editor: DefaultEditor,
    auto_refresh: bool,
    refreshes: Arc<AtomicUsize>,
}

/// What a backslash command asks the loop to do next
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(store: Arc<RestStore>, config: &Config) -> Result<Self> {
        let mut editor = DefaultEditor::new()?;

        // Load history from file if it exists
        let history_path = Self::history_path();
        if history_path.exists() {
            let _ = editor.load_history(&history_path);
        }

        let fetcher = ResultFetcher::new(store.clone(), config.results.clone());
        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = refreshes.clone();
        fetcher.set_refresh_callback(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        Ok(Self {
            store,
            fetcher,
            formatter: Formatter::new(config.output_format, config.colored),
            editor,
            auto_refresh: config.auto_refresh,
            refreshes,
        })
    }

    /// Run the interactive REPL loop
    pub async fn run(&mut self) -> Result<()> {
        println!("StreamHouse SQL Shell");
        println!("Connected to: {}", self.store.base_url());
        println!("End statements with ';'. Type \\h for help, \\q or Ctrl+D to quit");
        println!();

        let mut buffer = String::new();
        loop {
            let prompt = if buffer.is_empty() {
                "streamsql> "
            } else {
                "        -> "
            };

            match self.editor.readline(prompt) {
                Ok(line) => {
                    let line = line.trim();

                    // Skip empty lines
                    if line.is_empty() {
                        continue;
                    }

                    if buffer.is_empty() {
                        if line == "exit" || line == "quit" {
                            break;
                        }
                        if line.starts_with('\\') {
                            let _ = self.editor.add_history_entry(line);
                            match self.execute_command(line).await {
                                Ok(Flow::Quit) => break,
                                Ok(Flow::Continue) => {}
                                Err(e) => eprintln!("Error: {:#}", e),
                            }
                            println!();
                            continue;
                        }
                    }

                    if !buffer.is_empty() {
                        buffer.push('\n');
                    }
                    buffer.push_str(line);

                    if buffer.ends_with(';') {
                        let _ = self.editor.add_history_entry(buffer.as_str());
                        let statement = complete_statement(&buffer);
                        buffer.clear();
                        if let Some(sql) = statement {
                            if let Err(e) = self.execute_sql(&sql).await {
                                eprintln!("Error: {:#}", e);
                            }
                            println!();
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - drop the partial statement
                    println!("^C");
                    buffer.clear();
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D - exit
                    println!("exit");
                    break;
                }
                Err(err) => {
                    eprintln!("Error reading line: {}", err);
                    break;
                }
            }
        }

        if let Some(deletion) = self.fetcher.close().await {
            let _ = deletion.await;
        }

        // Save history on exit
        let history_path = Self::history_path();
        if let Some(parent) = history_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.editor.save_history(&history_path)?;

        println!("Goodbye!");
        Ok(())
    }

    /// Submit a statement, show its first page and optionally start
    /// auto-refresh
    async fn execute_sql(&mut self, sql: &str) -> Result<()> {
        if let Some(deletion) = self.fetcher.close().await {
            let _ = deletion.await;
        }

        let statement = self
            .store
            .execute_statement(sql)
            .await
            .context("Failed to execute statement")?;
        self.fetcher.init(statement).await;
        self.refreshes.store(0, Ordering::Relaxed);

        let results = self.fetcher.results();
        self.formatter.print_results(&results)?;
        println!("({} rows, {})", results.size(), self.fetcher.state());

        if self.auto_refresh && self.fetcher.state() == FetchState::Paused {
            self.fetcher.toggle_auto_refresh();
            self.formatter
                .print_info("Auto-refresh started; use \\show to see new rows");
        } else if self.fetcher.state() == FetchState::Paused {
            self.formatter
                .print_info("More results available: \\fetch, \\last or \\refresh");
        }
        Ok(())
    }

    /// Execute a backslash command
    async fn execute_command(&mut self, line: &str) -> Result<Flow> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let args = &tokens[1..];

        match tokens[0] {
            "\\q" => return Ok(Flow::Quit),
            "\\h" | "\\?" => Self::print_help(),
            "\\mode" => self.handle_mode(args)?,
            "\\refresh" => {
                let state = self.fetcher.toggle_auto_refresh();
                match state {
                    FetchState::Running => self.formatter.print_success("Auto-refresh started"),
                    FetchState::Paused => self.formatter.print_success("Auto-refresh paused"),
                    other => self
                        .formatter
                        .print_info(&format!("Nothing to refresh (results {})", other)),
                }
            }
            "\\fetch" => {
                let rows = self.fetcher.fetch_next_page().await;
                self.formatter.print_info(&format!(
                    "Fetched {} rows ({})",
                    rows,
                    self.fetcher.state()
                ));
            }
            "\\last" => {
                let rows = self.fetcher.jump_to_last_page().await;
                let results = self.fetcher.results();
                let start = results.size().saturating_sub(DEFAULT_SHOW_ROWS);
                self.formatter
                    .print_rows(&results, &results.rows(start, DEFAULT_SHOW_ROWS))?;
                println!(
                    "({} new rows, {} rows, {})",
                    rows,
                    results.size(),
                    self.fetcher.state()
                );
            }
            "\\show" => {
                let count = match args.first() {
                    Some(n) => n
                        .parse::<usize>()
                        .with_context(|| format!("Invalid row count: {}", n))?,
                    None => DEFAULT_SHOW_ROWS,
                };
                let results = self.fetcher.results();
                let start = results.size().saturating_sub(count);
                self.formatter
                    .print_rows(&results, &results.rows(start, count))?;
                println!("({} of {} rows)", results.size().min(count), results.size());
            }
            "\\status" => self.print_status().await,
            "\\stop" => match self.fetcher.close().await {
                Some(deletion) => {
                    if deletion.await.unwrap_or(false) {
                        self.formatter.print_success("Statement stopped");
                    } else {
                        self.formatter.print_error("Failed to stop statement");
                    }
                }
                None => self.formatter.print_info("No running statement"),
            },
            other => {
                println!("Unknown command: {}", other);
                println!("Type \\h for available commands");
            }
        }

        Ok(Flow::Continue)
    }

    fn handle_mode(&mut self, args: &[&str]) -> Result<()> {
        let table_mode = match args.first().copied() {
            None => self.fetcher.toggle_table_mode(),
            Some(mode) => {
                let table_mode = parse_mode(mode)?;
                self.fetcher.results().set_mode(table_mode);
                table_mode
            }
        };

        let name = if table_mode { "table" } else { "changelog" };
        self.formatter
            .print_success(&format!("Showing results in {} mode", name));
        Ok(())
    }

    async fn print_status(&self) {
        let statement = self.fetcher.statement().await;
        let results = self.fetcher.results();
        let name = if statement.name.is_empty() {
            "(none)"
        } else {
            statement.name.as_str()
        };

        println!("Statement:     {}", name);
        println!("Phase:         {}", statement.phase);
        if !statement.detail.is_empty() {
            println!("Detail:        {}", statement.detail);
        }
        println!("Fetch state:   {}", self.fetcher.state());
        println!(
            "Mode:          {}",
            if results.is_table_mode() { "table" } else { "changelog" }
        );
        println!("Table rows:    {}", results.table_len());
        println!(
            "Changelog:     {} / {}",
            results.changelog_len(),
            results.capacity()
        );
        println!("Refreshes:     {}", self.refreshes.load(Ordering::Relaxed));
        println!("More pages:    {}", statement.has_more_pages());
    }

    /// Print help message
    fn print_help() {
        println!("StreamHouse SQL Shell Help");
        println!();
        println!("Statements end with ';' and may span several lines.");
        println!();
        println!("Commands:");
        println!("  \\q                       Exit the shell");
        println!("  \\h, \\?                   Show this help");
        println!("  \\mode [table|changelog]  Switch or toggle the result view");
        println!("  \\refresh                 Toggle background auto-refresh");
        println!("  \\fetch                   Fetch the next page now");
        println!("  \\last                    Fetch until the last page");
        println!("  \\show [N]                Print the last N rows (default {})", DEFAULT_SHOW_ROWS);
        println!("  \\status                  Show statement and fetch state");
        println!("  \\stop                    Stop the current statement");
        println!();
        println!("Examples:");
        println!("  SELECT * FROM orders;");
        println!("  SELECT region, COUNT(*) AS orders");
        println!("    FROM orders GROUP BY region;");
        println!();
    }

    /// Get history file path
    fn history_path() -> PathBuf {
        streamhouse_dir().join("sql_history")
    }
}

/// The statement in `buffer` without its terminating `;`, once complete
fn complete_statement(buffer: &str) -> Option<String> {
    let trimmed = buffer.trim_end();
    let sql = trimmed.strip_suffix(';')?.trim();
    if sql.is_empty() {
        None
    } else {
        Some(sql.to_string())
    }
}

fn parse_mode(mode: &str) -> Result<bool> {
    match mode.to_ascii_lowercase().as_str() {
        "table" => Ok(true),
        "changelog" => Ok(false),
        other => anyhow::bail!("Unknown mode '{}', expected table or changelog", other),
    }
}
