//! Statement structures and their canonical rendering
//!
//! The canonical form is deterministic: columns iterate in BTreeMap
//! order, every value is single-quoted with `''` escaping, and spacing
//! is fixed. Two nodes canonicalizing the same statement must agree
//! byte-for-byte, since the canonical text is hashed and signed.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Quote a literal value for canonical SQL output
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A literal value in a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(String),
    Null,
}

impl Literal {
    /// The bare text of the value, as stored in row pre-images
    pub fn as_text(&self) -> &str {
        match self {
            Literal::String(s) => s,
            Literal::Number(n) => n,
            Literal::Null => "",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{}", quote_literal(s)),
            Literal::Number(n) => write!(f, "{}", quote_literal(n)),
            Literal::Null => write!(f, "NULL"),
        }
    }
}

/// The single-column WHERE restriction: exactly `column = literal`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub value: Literal,
}

/// Statement classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Insert,
    Update,
    Delete,
    CreateTable,
    DropTable,
    Select,
    Other,
}

impl QueryKind {
    pub fn is_dml(&self) -> bool {
        matches!(self, QueryKind::Insert | QueryKind::Update | QueryKind::Delete)
    }
}

/// A parsed statement of the restricted dialect
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Insert {
        table: String,
        columns: BTreeMap<String, Literal>,
    },
    Update {
        table: String,
        set: BTreeMap<String, Literal>,
        condition: Condition,
    },
    Delete {
        table: String,
        condition: Condition,
    },
    CreateTable {
        table: String,
        body: String,
    },
    DropTable {
        table: String,
    },
    Select {
        raw: String,
    },
    /// Any lexable statement the dialect does not recognize; kept raw
    /// and handed to the engine untouched, like SELECT
    Other {
        raw: String,
    },
}

impl Statement {
    pub fn kind(&self) -> QueryKind {
        match self {
            Statement::Insert { .. } => QueryKind::Insert,
            Statement::Update { .. } => QueryKind::Update,
            Statement::Delete { .. } => QueryKind::Delete,
            Statement::CreateTable { .. } => QueryKind::CreateTable,
            Statement::DropTable { .. } => QueryKind::DropTable,
            Statement::Select { .. } => QueryKind::Select,
            Statement::Other { .. } => QueryKind::Other,
        }
    }

    /// Target table, if the statement has one
    pub fn table(&self) -> Option<&str> {
        match self {
            Statement::Insert { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. }
            | Statement::CreateTable { table, .. }
            | Statement::DropTable { table } => Some(table),
            Statement::Select { .. } | Statement::Other { .. } => None,
        }
    }

    /// Column/value map of an INSERT or the SET clause of an UPDATE
    pub fn update_columns(&self) -> Option<&BTreeMap<String, Literal>> {
        match self {
            Statement::Insert { columns, .. } => Some(columns),
            Statement::Update { set, .. } => Some(set),
            _ => None,
        }
    }

    /// The WHERE condition of an UPDATE or DELETE
    pub fn one_column_condition(&self) -> Option<&Condition> {
        match self {
            Statement::Update { condition, .. } | Statement::Delete { condition, .. } => {
                Some(condition)
            }
            _ => None,
        }
    }

    /// Splice an additional column into an INSERT (the predicted key)
    pub fn extend_insert(&mut self, column: String, value: Literal) -> Result<()> {
        let Statement::Insert { columns, .. } = self else {
            return Err(Error::Parse("can only extend INSERT statements".into()));
        };
        if columns.contains_key(&column) {
            return Err(Error::Parse(format!("column {} already present", column)));
        }
        columns.insert(column, value);
        Ok(())
    }

    /// Deterministic textual form used for hashing, signing, and replay
    pub fn canonical_query(&self) -> String {
        match self {
            Statement::Insert { table, columns } => {
                let cols: Vec<&str> = columns.keys().map(String::as_str).collect();
                let vals: Vec<String> = columns.values().map(Literal::to_string).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table,
                    cols.join(","),
                    vals.join(",")
                )
            }
            Statement::Update {
                table,
                set,
                condition,
            } => {
                let assignments: Vec<String> =
                    set.iter().map(|(c, v)| format!("{}={}", c, v)).collect();
                format!(
                    "UPDATE {} SET {} WHERE {}={}",
                    table,
                    assignments.join(","),
                    condition.column,
                    condition.value
                )
            }
            Statement::Delete { table, condition } => {
                format!(
                    "DELETE FROM {} WHERE {}={}",
                    table, condition.column, condition.value
                )
            }
            Statement::CreateTable { table, body } => {
                format!("CREATE TABLE {} ({})", table, body)
            }
            Statement::DropTable { table } => format!("DROP TABLE {}", table),
            Statement::Select { raw } | Statement::Other { raw } => raw.clone(),
        }
    }
}
