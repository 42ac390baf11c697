//! Error types for the StreamHouse SQL client.
//!
//! Only the statement gateway can fail in a way that is reported through
//! `Result`. Problems inside the materialized result set are never errors:
//!
//! - **Schema mismatch**: a row with the wrong number of fields is dropped and
//!   [`MaterializedResultSet::append`](crate::MaterializedResultSet::append)
//!   returns `false`.
//! - **Fetch failure**: the fetcher moves to
//!   [`FetchState::Failed`](crate::FetchState::Failed) and can be restarted.
//! - **Missing key on retract**: silently ignored.

use thiserror::Error;

/// Convenience alias used by every fallible API in this crate.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised while talking to the statement gateway.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connection refused, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-success status code.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The statement reached the `FAILED` phase on the server.
    #[error("Statement '{name}' failed: {detail}")]
    StatementFailed { name: String, detail: String },

    /// The statement did not leave the `PENDING` phase in time.
    #[error("Statement '{name}' still pending after {waited_ms}ms")]
    StatementTimeout { name: String, waited_ms: u64 },

    /// A result payload does not match the statement's column schema.
    #[error("Conversion error: {0}")]
    Conversion(String),
}

impl ClientError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_timeout() || e.is_connect(),
            ClientError::Api { status, .. } => *status >= 500 || *status == 429,
            ClientError::StatementTimeout { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ClientError::Api {
            status: 404,
            message: "statement not found".to_string(),
        };
        assert_eq!(err.to_string(), "API error (404): statement not found");
    }

    #[test]
    fn test_retryable_classification() {
        let unavailable = ClientError::Api {
            status: 503,
            message: "busy".to_string(),
        };
        let bad_request = ClientError::Api {
            status: 400,
            message: "bad sql".to_string(),
        };
        assert!(unavailable.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!ClientError::Conversion("arity".to_string()).is_retryable());
        assert!(ClientError::StatementTimeout {
            name: "s".to_string(),
            waited_ms: 10
        }
        .is_retryable());
    }

    #[test]
    fn test_statement_failed_display() {
        let err = ClientError::StatementFailed {
            name: "stmt-1".to_string(),
            detail: "table not found".to_string(),
        };
        assert!(err.to_string().contains("stmt-1"));
        assert!(err.to_string().contains("table not found"));
    }
}
