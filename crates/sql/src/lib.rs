//! SQL side of the transaction core
//!
//! Parses and canonicalizes the restricted statement dialect, captures
//! row pre-images, synthesizes rollback statements, and executes against
//! the engine behind the [`QueryEngine`] seam. A SQLite-backed engine is
//! included; any executor honoring the trait contract works.

pub mod engine;
mod error;
pub mod parsing;
mod processor;
mod signal;
mod sqlite;

pub use engine::{QueryEngine, Row};
pub use error::{Error, Result};
pub use processor::{QueryParsed, QueryProcessor};
pub use signal::{
    format_special_error_message, SIGNAL_PUB_KEY_REQUIRED, SIGNAL_SIGNATURE_REQUIRED,
};
pub use sqlite::SqliteEngine;
