//! Error types for SQL parsing and query processing

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("SQL parse error: {0}")]
    Parse(String),

    #[error("Syntax check error: {0}")]
    Syntax(String),

    #[error("Query condition has no primary key")]
    NoPrimaryKeyInCondition,

    #[error("Update of primary key value is not allowed")]
    PrimaryKeyMutationForbidden,

    #[error("Table {0} has no auto-increment key to build a reference ID from")]
    NoAutoIncrement(String),

    #[error("Row in table {table} with primary key '{key}' does not exist")]
    RowNotFound { table: String, key: String },

    #[error("Statement cannot be rolled back: {0}")]
    NotRollbackable(String),

    #[error("Statement does not mutate data: {0}")]
    NotMutating(String),

    #[error("Invalid credentials comment: {0}")]
    InvalidCredentials(String),

    #[error("Unknown signal kind: {0}")]
    UnknownSignalKind(u16),

    #[error("Engine error: {0}")]
    Engine(String),
}
