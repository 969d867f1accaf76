//! Query processing: canonicalization, pre-image capture, and rollback
//! synthesis
//!
//! The processor turns a raw statement into everything the transaction
//! layer needs: the canonical text, the row's reference id, and a
//! rollback statement computed from the pre-image *before* execution.
//! Execution is optimistic; the rollback is the safety mechanism when
//! the chain later diverges.

use sqlchain_common::SqlUpdate;

use crate::engine::{QueryEngine, Row};
use crate::error::{Error, Result};
use crate::parsing::ast::quote_literal;
use crate::parsing::{Literal, Parser, QueryKind, Statement};

/// Fully analyzed statement, ready to execute and to wrap into a
/// transaction
#[derive(Debug, Clone)]
pub struct QueryParsed {
    pub statement: Statement,
    /// Canonical text, rewritten if a predicted key was spliced in
    pub sql: String,
    /// The table's primary key column (empty for non-DML)
    pub key_column: String,
    /// The touched row's key value (empty for non-DML)
    pub key_value: String,
    /// Row snapshot taken before execution, for UPDATE and DELETE
    pub row_before: Option<Row>,
    /// Credentials extracted from leading comments, if the client
    /// embedded them
    pub pub_key: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
    pub tx_bytes: Option<Vec<u8>>,
}

impl QueryParsed {
    pub fn kind(&self) -> QueryKind {
        self.statement.kind()
    }

    /// Stable identity of the touched row: `table.key` for DML, the
    /// bare table name for DDL
    pub fn reference_id(&self) -> String {
        let Some(table) = self.statement.table() else {
            return String::new();
        };
        match self.kind() {
            QueryKind::CreateTable | QueryKind::DropTable => table.to_string(),
            _ => format!("{}.{}", table, self.key_value),
        }
    }

    /// Synthesize the statement that restores the pre-image when applied
    /// to the post-image state
    pub fn build_rollback_sql(&self) -> Result<String> {
        match &self.statement {
            Statement::Update { table, set, .. } => {
                let row = self.row_before.as_ref().ok_or_else(|| Error::RowNotFound {
                    table: table.clone(),
                    key: self.key_value.clone(),
                })?;
                let mut assignments = Vec::with_capacity(set.len());
                for column in set.keys() {
                    let previous = row.get(column).ok_or_else(|| {
                        Error::Engine(format!("pre-image misses column {}", column))
                    })?;
                    assignments.push(format!("{}={}", column, quote_literal(previous)));
                }
                Ok(format!(
                    "UPDATE {} SET {} WHERE {}={}",
                    table,
                    assignments.join(","),
                    self.key_column,
                    quote_literal(&self.key_value)
                ))
            }
            Statement::Delete { table, .. } => {
                let row = self.row_before.as_ref().ok_or_else(|| Error::RowNotFound {
                    table: table.clone(),
                    key: self.key_value.clone(),
                })?;
                let columns: Vec<&str> = row.keys().map(String::as_str).collect();
                let values: Vec<String> = row.values().map(|v| quote_literal(v)).collect();
                Ok(format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table,
                    columns.join(","),
                    values.join(",")
                ))
            }
            Statement::Insert { table, .. } => Ok(format!(
                "DELETE FROM {} WHERE {}={}",
                table,
                self.key_column,
                quote_literal(&self.key_value)
            )),
            Statement::CreateTable { table, .. } => Ok(format!("DROP TABLE {}", table)),
            Statement::DropTable { table } => Err(Error::NotRollbackable(format!(
                "DROP TABLE {} cannot be reversed without a snapshot",
                table
            ))),
            Statement::Select { raw } | Statement::Other { raw } => {
                Err(Error::NotMutating(raw.clone()))
            }
        }
    }
}

/// Statement analyzer and optimistic executor over an engine
pub struct QueryProcessor<'a, E: QueryEngine> {
    engine: &'a E,
}

impl<'a, E: QueryEngine> QueryProcessor<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// Parse and analyze a raw statement without executing it
    pub fn parse_query(&self, raw: &str) -> Result<QueryParsed> {
        let (pub_key, signature, tx_bytes) = parse_credentials(raw)?;
        let statement = Parser::parse(raw)?;
        let mut parsed = QueryParsed {
            sql: statement.canonical_query(),
            statement,
            key_column: String::new(),
            key_value: String::new(),
            row_before: None,
            pub_key,
            signature,
            tx_bytes,
        };
        self.check_query_syntax(&parsed)?;
        self.patch_row_info(&mut parsed)?;
        Ok(parsed)
    }

    /// Parse, build the update record, then execute the canonical SQL.
    /// The rollback is computed from the pre-image before execution.
    pub fn execute_query(&self, raw: &str) -> Result<SqlUpdate> {
        let parsed = self.parse_query(raw)?;
        self.execute_parsed_query(parsed)
    }

    /// Execute an already analyzed statement
    pub fn execute_parsed_query(&self, parsed: QueryParsed) -> Result<SqlUpdate> {
        let update = self.make_sql_update(&parsed)?;
        self.engine.execute(&parsed.sql)?;
        Ok(update)
    }

    /// Replay a transaction's canonical SQL as-is
    pub fn execute_query_from_tx(&self, update: &SqlUpdate) -> Result<()> {
        self.engine.execute(&update.query)
    }

    /// Apply a transaction's rollback statement as-is
    pub fn execute_rollback_from_tx(&self, update: &SqlUpdate) -> Result<()> {
        self.engine.execute(&update.rollback_query)
    }

    /// Build the chain-persisted update record: canonical query,
    /// reference id, and rollback
    pub fn make_sql_update(&self, parsed: &QueryParsed) -> Result<SqlUpdate> {
        let rollback = parsed.build_rollback_sql()?;
        let update = SqlUpdate::new(parsed.sql.clone(), parsed.reference_id(), rollback);
        tracing::debug!(
            "rollback for {} is {} and refID {}",
            update.query,
            update.rollback_query,
            update.reference_id
        );
        Ok(update)
    }

    /// Probe DML through the engine's EXPLAIN to catch semantic errors
    /// the parser cannot see
    fn check_query_syntax(&self, parsed: &QueryParsed) -> Result<()> {
        if !parsed.kind().is_dml() {
            return Ok(());
        }
        self.engine
            .explain(&parsed.sql)
            .map_err(|e| Error::Syntax(e.to_string()))
    }

    /// Discover the key column, capture the pre-image, and predict a
    /// missing INSERT key
    fn patch_row_info(&self, parsed: &mut QueryParsed) -> Result<()> {
        let kind = parsed.kind();
        if !kind.is_dml() {
            return Ok(());
        }
        let table = parsed
            .statement
            .table()
            .ok_or_else(|| Error::Parse("statement has no table".into()))?
            .to_string();
        let key_column = self.engine.primary_key_column(&table)?;
        parsed.key_column = key_column.clone();

        match kind {
            QueryKind::Update | QueryKind::Delete => {
                let condition = parsed
                    .statement
                    .one_column_condition()
                    .ok_or(Error::NoPrimaryKeyInCondition)?;
                if condition.column != key_column {
                    return Err(Error::NoPrimaryKeyInCondition);
                }
                let key_value = condition.value.as_text().to_string();
                let select = format!(
                    "SELECT * FROM {} WHERE {}={}",
                    table,
                    key_column,
                    quote_literal(&key_value)
                );
                let row = self
                    .engine
                    .select_row(&select)?
                    .ok_or_else(|| Error::RowNotFound {
                        table: table.clone(),
                        key: key_value.clone(),
                    })?;
                parsed.row_before = Some(row);
                parsed.key_value = key_value;
            }
            QueryKind::Insert => {
                let explicit_key = parsed
                    .statement
                    .update_columns()
                    .ok_or_else(|| Error::Parse("INSERT without columns".into()))?
                    .get(&key_column)
                    .map(|value| value.as_text().to_string());
                if let Some(value) = explicit_key {
                    parsed.key_value = value;
                } else {
                    // The key is missing; predict the next auto-increment
                    // and splice it in. The rewrite changes the canonical
                    // form, which is what gets signed and replayed.
                    let next = self
                        .engine
                        .next_key_value(&table)?
                        .ok_or_else(|| Error::NoAutoIncrement(table.clone()))?;
                    parsed
                        .statement
                        .extend_insert(key_column.clone(), Literal::Number(next.clone()))?;
                    parsed.key_value = next;
                    parsed.sql = parsed.statement.canonical_query();
                }
            }
            _ => {}
        }

        // A primary key value is never mutated in place; it would break
        // every reference id pointing at the row.
        if kind == QueryKind::Update {
            let set = parsed.statement.update_columns();
            if set.is_some_and(|set| set.contains_key(&key_column)) {
                return Err(Error::PrimaryKeyMutationForbidden);
            }
        }
        Ok(())
    }
}

/// Extract client credentials from leading block comments.
///
/// Recognized markers, in any order and any subset:
/// `/*PUBKEY:<hex>;*/`, `/*SIGNATURE:<hex>;*/`, `/*TXDATA:<hex>;*/`.
/// Unrecognized comments are left for the lexer to skip.
#[allow(clippy::type_complexity)]
fn parse_credentials(
    raw: &str,
) -> Result<(Option<Vec<u8>>, Option<Vec<u8>>, Option<Vec<u8>>)> {
    let mut pub_key = None;
    let mut signature = None;
    let mut tx_bytes = None;

    let mut rest = raw.trim_start();
    while let Some(stripped) = rest.strip_prefix("/*") {
        let Some(end) = stripped.find("*/") else {
            break;
        };
        let inner = stripped[..end].trim().trim_end_matches(';');
        if let Some(value) = inner.strip_prefix("PUBKEY:") {
            pub_key = Some(decode_credential("PUBKEY", value)?);
        } else if let Some(value) = inner.strip_prefix("SIGNATURE:") {
            signature = Some(decode_credential("SIGNATURE", value)?);
        } else if let Some(value) = inner.strip_prefix("TXDATA:") {
            tx_bytes = Some(decode_credential("TXDATA", value)?);
        }
        rest = stripped[end + 2..].trim_start();
    }

    Ok((pub_key, signature, tx_bytes))
}

fn decode_credential(marker: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim())
        .map_err(|e| Error::InvalidCredentials(format!("{}: {}", marker, e)))
}
