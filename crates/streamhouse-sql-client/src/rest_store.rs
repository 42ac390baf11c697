//! [`Store`] backed by the StreamHouse SQL statements REST API.
//!
//! Endpoints (relative to the configured base URL):
//!
//! - `POST   /api/v1/sql/statements` submit `{"statement": "..."}`
//! - `GET    /api/v1/sql/statements/{name}` statement status and schema
//! - `GET    /api/v1/sql/statements/{name}/results?pageToken=...` one page
//! - `DELETE /api/v1/sql/statements/{name}`

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::RestStoreConfig;
use crate::convert::json_to_row;
use crate::error::{ClientError, Result};
use crate::statement::{ColumnSchema, Statement, StatementPhase, StatementResults};
use crate::store::Store;
use crate::types::{OperationKind, Row};

const STATEMENTS_PATH: &str = "/api/v1/sql/statements";

/// Statement submission body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitStatementRequest {
    pub statement: String,
}

/// Statement metadata returned by submit and status calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResponse {
    pub name: String,
    #[serde(default)]
    pub status: StatementStatus,
    #[serde(default)]
    pub schema: ResultSchema,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementStatus {
    pub phase: StatementPhase,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSchema {
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
}

/// One page of change events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsPage {
    #[serde(default)]
    pub data: Vec<ResultRow>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A change event: operation code plus positional column values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRow {
    pub op: u8,
    pub row: Vec<Value>,
}

impl StatementResponse {
    fn into_statement(self) -> Statement {
        Statement {
            name: self.name,
            phase: self.status.phase,
            detail: self.status.detail,
            columns: self.schema.columns,
            ..Default::default()
        }
    }
}

/// REST implementation of [`Store`] plus statement submission.
pub struct RestStore {
    config: RestStoreConfig,
    client: Client,
}

impl RestStore {
    pub fn new(config: RestStoreConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Submit `sql`, wait for it to leave `PENDING`, and fetch the first
    /// page of results.
    pub async fn execute_statement(&self, sql: &str) -> Result<Statement> {
        let mut response = self.submit_statement(sql).await?;
        debug!(statement = %response.name, phase = %response.status.phase, "Submitted statement");

        let started = Instant::now();
        while response.status.phase == StatementPhase::Pending {
            let waited = started.elapsed();
            if waited >= self.config.submit_timeout() {
                return Err(ClientError::StatementTimeout {
                    name: response.name,
                    waited_ms: waited.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.config.poll_interval()).await;
            response = self.get_statement(&response.name).await?;
        }

        if response.status.phase == StatementPhase::Failed {
            return Err(ClientError::StatementFailed {
                name: response.name,
                detail: response.status.detail,
            });
        }

        let statement = response.into_statement();
        self.next_page(&statement).await
    }

    pub async fn submit_statement(&self, sql: &str) -> Result<StatementResponse> {
        let body = SubmitStatementRequest {
            statement: sql.to_string(),
        };
        self.send_json(self.client.post(self.url("")).json(&body))
            .await
    }

    pub async fn get_statement(&self, name: &str) -> Result<StatementResponse> {
        self.send_json(self.client.get(self.url(&format!("/{}", name))))
            .await
    }

    /// Fetch the page after `statement.page_token` (the first page when the
    /// token is empty) and convert it against the statement's columns.
    async fn next_page(&self, statement: &Statement) -> Result<Statement> {
        let mut request = self
            .client
            .get(self.url(&format!("/{}/results", statement.name)));
        if statement.has_more_pages() {
            request = request.query(&[("pageToken", statement.page_token.as_str())]);
        }
        let page: ResultsPage = self.send_json(request).await?;

        let rows = page
            .data
            .iter()
            .map(|event| -> Result<Row> {
                let operation = OperationKind::from_code(event.op).ok_or_else(|| {
                    ClientError::Conversion(format!("unknown operation code {}", event.op))
                })?;
                json_to_row(&statement.columns, operation, &event.row)
            })
            .collect::<Result<Vec<_>>>()?;

        let page_token = page.next_page_token.unwrap_or_default();
        let phase = if page_token.is_empty() && statement.is_running() {
            StatementPhase::Completed
        } else {
            statement.phase
        };
        debug!(statement = %statement.name, rows = rows.len(), "Received results page");

        Ok(Statement {
            name: statement.name.clone(),
            phase,
            detail: statement.detail.clone(),
            columns: statement.columns.clone(),
            results: StatementResults {
                headers: Vec::new(),
                rows,
            },
            page_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.config.base_url.trim_end_matches('/'),
            STATEMENTS_PATH,
            path
        )
    }

    async fn send_json<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Store for RestStore {
    async fn fetch_statement_results(&self, statement: &Statement) -> Result<Statement> {
        self.next_page(statement).await
    }

    async fn delete_statement(&self, name: &str) -> bool {
        let result = self.client.delete(self.url(&format!("/{}", name))).send().await;
        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(statement = %name, status = response.status().as_u16(), "Delete rejected");
                false
            }
            Err(e) => {
                debug!(statement = %name, error = %e, "Delete request failed");
                false
            }
        }
    }
}
