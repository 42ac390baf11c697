//! StreamHouse SQL client - result materialization and paging
//!
//! Streaming SQL statements produce an unbounded stream of change events
//! (`+I`, `-U`, `+U`, `-D`). This crate turns that stream into two bounded,
//! concurrently readable views and keeps them fed from the server:
//!
//! - [`MaterializedResultSet`]: a capacity-bounded changelog plus the
//!   compacted table derived from it, with [`ResultCursor`]s for scrolling
//! - [`ResultFetcher`]: the paging state machine with a background
//!   auto-refresh task and single-flight fetches
//! - [`RestStore`]: a [`Store`] talking to the StreamHouse REST API
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use streamhouse_sql_client::{FetcherConfig, RestStore, RestStoreConfig, ResultFetcher};
//!
//! let store = Arc::new(RestStore::new(RestStoreConfig::new("http://localhost:8080")));
//! let first_page = store.execute_statement("SELECT * FROM orders").await?;
//!
//! let fetcher = ResultFetcher::new(store, FetcherConfig::default());
//! fetcher.init(first_page).await;
//! fetcher.toggle_auto_refresh();
//!
//! for row in fetcher.results().iterator(false) {
//!     println!("{:?}", row.rendered());
//! }
//! ```

pub mod config;
pub mod convert;
pub mod cursor;
mod dual_list;
pub mod error;
pub mod fetcher;
pub mod rest_store;
pub mod result_set;
pub mod statement;
pub mod store;
pub mod types;

pub use config::{FetcherConfig, RestStoreConfig};
pub use convert::{json_to_field, json_to_row, RowFieldSpec, TypeSpec};
pub use cursor::ResultCursor;
pub use error::{ClientError, Result};
pub use fetcher::{FetchState, RefreshCallback, ResultFetcher};
pub use rest_store::{
    ResultRow, ResultSchema, ResultsPage, RestStore, StatementResponse, StatementStatus,
    SubmitStatementRequest,
};
pub use result_set::{MaterializedResultSet, OPERATION_COLUMN};
pub use statement::{ColumnSchema, Statement, StatementPhase, StatementResults};
pub use store::Store;
pub use types::{Field, FieldType, OperationKind, Row, RowKey};
