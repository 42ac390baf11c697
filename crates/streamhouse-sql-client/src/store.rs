//! Boundary between the fetcher and whatever serves statement results.

use async_trait::async_trait;

use crate::error::Result;
use crate::statement::Statement;

/// Source of statement result pages.
///
/// [`RestStore`](crate::RestStore) talks to the StreamHouse REST API; tests
/// plug in scripted implementations.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the page after `statement.page_token`.
    ///
    /// The returned statement carries only the new rows and the next
    /// continuation token (empty once the stream is exhausted).
    async fn fetch_statement_results(&self, statement: &Statement) -> Result<Statement>;

    /// Ask the server to drop a statement. Returns `false` on any failure.
    async fn delete_statement(&self, name: &str) -> bool;
}
