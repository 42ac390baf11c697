//! Output formatting for statement results
//!
//! Supports multiple output formats:
//! - Table: aligned columns sized from the result set (default)
//! - JSON: array of objects keyed by column name
//! - YAML: same shape as JSON
//! - CSV: header line plus one line per row

use crate::config::OutputFormat;
use anyhow::Result;
use colored::*;
use serde_json::{Map, Value};
use streamhouse_sql_client::{MaterializedResultSet, OperationKind, Row};

/// Widest a table column may grow before values are truncated
const MAX_COLUMN_WIDTH: usize = 50;

/// Format and print output based on configured format
pub struct Formatter {
    format: OutputFormat,
    colored: bool,
}

impl Formatter {
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self { format, colored }
    }

    /// Print every row of the active view
    pub fn print_results(&self, results: &MaterializedResultSet) -> Result<()> {
        let rows: Vec<Row> = results.iterator(false).collect();
        self.print_rows(results, &rows)
    }

    /// Print `rows` (taken from the active view) with the result set's
    /// headers and column widths
    pub fn print_rows(&self, results: &MaterializedResultSet, rows: &[Row]) -> Result<()> {
        let headers = results.headers();
        let output = match self.format {
            OutputFormat::Table => {
                let changelog = !results.is_table_mode();
                render_table(&headers, &results.max_column_widths(), rows, changelog && self.colored)
            }
            OutputFormat::Json => serde_json::to_string_pretty(&to_objects(&headers, rows))?,
            OutputFormat::Yaml => serde_yaml::to_string(&to_objects(&headers, rows))?,
            OutputFormat::Csv => render_csv(&headers, rows),
        };
        println!("{}", output.trim_end());
        Ok(())
    }

    /// Print a success message
    pub fn print_success(&self, message: &str) {
        if self.colored {
            println!("{} {}", "✅".green(), message);
        } else {
            println!("✅ {}", message);
        }
    }

    /// Print an error message
    pub fn print_error(&self, message: &str) {
        if self.colored {
            eprintln!("{} {}", "❌".red(), message);
        } else {
            eprintln!("❌ {}", message);
        }
    }

    /// Print an info message
    pub fn print_info(&self, message: &str) {
        if self.colored {
            println!("{} {}", "ℹ️".blue(), message);
        } else {
            println!("ℹ️  {}", message);
        }
    }
}

/// Render rows as an aligned table. `widths` come from
/// [`MaterializedResultSet::max_column_widths`] and are capped here.
pub fn render_table(headers: &[String], widths: &[usize], rows: &[Row], color_operations: bool) -> String {
    if headers.is_empty() {
        return "Statement returned no columns".to_string();
    }

    let widths: Vec<usize> = widths.iter().map(|w| (*w).min(MAX_COLUMN_WIDTH)).collect();
    let width_of = |i: usize| widths.get(i).copied().unwrap_or(MAX_COLUMN_WIDTH);
    let mut lines = Vec::with_capacity(rows.len() + 2);

    let header: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| pad(h, width_of(i)))
        .collect();
    lines.push(header.join(" | "));

    let separator: Vec<String> = (0..headers.len()).map(|i| "-".repeat(width_of(i))).collect();
    lines.push(separator.join("-+-"));

    for row in rows {
        let formatted: Vec<String> = row
            .rendered()
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let cell = pad(value, width_of(i));
                if i == 0 && color_operations {
                    colorize_operation(&cell, value)
                } else {
                    cell
                }
            })
            .collect();
        lines.push(formatted.join(" | "));
    }

    lines.join("\n")
}

/// Render rows as CSV
pub fn render_csv(headers: &[String], rows: &[Row]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    let header: Vec<String> = headers.iter().map(|h| escape_csv(h)).collect();
    lines.push(header.join(","));

    for row in rows {
        let formatted: Vec<String> = row.rendered().iter().map(|v| escape_csv(v)).collect();
        lines.push(formatted.join(","));
    }
    lines.join("\n")
}

/// Build one JSON object per row, keyed by header
fn to_objects(headers: &[String], rows: &[Row]) -> Vec<Value> {
    rows.iter()
        .map(|row| {
            let obj: Map<String, Value> = headers
                .iter()
                .cloned()
                .zip(row.rendered().into_iter().map(Value::String))
                .collect();
            Value::Object(obj)
        })
        .collect()
}

/// Left-align `value` in `width` characters, truncating with `...`
fn pad(value: &str, width: usize) -> String {
    let len = value.chars().count();
    if len > width {
        let kept: String = value.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{}{}", value, " ".repeat(width - len))
    }
}

fn colorize_operation(cell: &str, operation: &str) -> String {
    let kind = [
        OperationKind::Insert,
        OperationKind::UpdateBefore,
        OperationKind::UpdateAfter,
        OperationKind::Delete,
    ]
    .into_iter()
    .find(|op| op.as_str() == operation);

    match kind {
        Some(OperationKind::Insert) => cell.green().to_string(),
        Some(OperationKind::UpdateAfter) => cell.cyan().to_string(),
        Some(OperationKind::UpdateBefore) => cell.yellow().to_string(),
        Some(OperationKind::Delete) => cell.red().to_string(),
        None => cell.to_string(),
    }
}

/// Escape a string for CSV output
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
