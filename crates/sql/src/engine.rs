//! The seam to the underlying SQL engine
//!
//! The core treats the engine as an opaque executor. Implementations
//! must support syntax probing via EXPLAIN, primary-key discovery,
//! next-auto-increment prediction, single-row reads, and arbitrary DML.
//! All calls are blocking and auto-committed; the core never holds the
//! engine in a mid-transaction state.

use std::collections::BTreeMap;

use crate::error::Result;

/// A row pre-image: column name to textual value, NULL as empty string.
///
/// The map's stable iteration order feeds the column list of DELETE
/// rollbacks, so it is part of the canonical-form contract.
pub type Row = BTreeMap<String, String>;

pub trait QueryEngine: Send + Sync {
    /// Execute a statement for its side effects
    fn execute(&self, sql: &str) -> Result<()>;

    /// Check a statement without executing it
    fn explain(&self, sql: &str) -> Result<()>;

    /// The declared primary key column of a table
    fn primary_key_column(&self, table: &str) -> Result<String>;

    /// Run a single-row SELECT, returning the row if one matches
    fn select_row(&self, sql: &str) -> Result<Option<Row>>;

    /// Predict the next auto-increment key of a table, if it has one
    fn next_key_value(&self, table: &str) -> Result<Option<String>>;
}
