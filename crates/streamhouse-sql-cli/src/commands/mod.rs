//! Command handlers for streamsql
//!
//! - Query: execute one statement, drain its results and print them

pub mod query;

pub use query::run_query;
