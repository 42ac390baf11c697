//! Statement handle shared between the gateway and the fetcher.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::convert::TypeSpec;
use crate::types::Row;

/// Server-side lifecycle phase of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementPhase {
    #[default]
    Pending,
    Running,
    Completed,
    Deleting,
    Failed,
    Stopped,
}

impl StatementPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementPhase::Pending => "PENDING",
            StatementPhase::Running => "RUNNING",
            StatementPhase::Completed => "COMPLETED",
            StatementPhase::Deleting => "DELETING",
            StatementPhase::Failed => "FAILED",
            StatementPhase::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for StatementPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(StatementPhase::Pending),
            "RUNNING" => Ok(StatementPhase::Running),
            "COMPLETED" => Ok(StatementPhase::Completed),
            "DELETING" => Ok(StatementPhase::Deleting),
            "FAILED" => Ok(StatementPhase::Failed),
            "STOPPED" => Ok(StatementPhase::Stopped),
            other => Err(format!("unknown statement phase: {}", other)),
        }
    }
}

/// One column of a statement's result schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub type_spec: TypeSpec,
}

/// Rows carried by one page of results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementResults {
    /// Inline header names; empty when the page only carries data.
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

/// Snapshot of a statement and its most recent results page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub name: String,
    pub phase: StatementPhase,
    pub detail: String,
    pub columns: Vec<ColumnSchema>,
    pub results: StatementResults,
    /// Continuation token for the next page; empty when there is none.
    pub page_token: String,
}

impl Statement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Column names, preferring the inline result headers over the schema.
    pub fn headers(&self) -> Vec<String> {
        if !self.results.headers.is_empty() {
            return self.results.headers.clone();
        }
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.results.rows
    }

    pub fn has_more_pages(&self) -> bool {
        !self.page_token.is_empty()
    }

    /// Whether the server is still producing results for this statement.
    pub fn is_running(&self) -> bool {
        matches!(
            self.phase,
            StatementPhase::Pending | StatementPhase::Running
        )
    }
}
