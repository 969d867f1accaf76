//! SQLite-backed implementation of the engine seam

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension};

use crate::engine::{QueryEngine, Row};
use crate::error::{Error, Result};

/// A [`QueryEngine`] over a shared SQLite connection
pub struct SqliteEngine {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEngine {
    /// Open an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(engine_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a file-backed database
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(engine_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Wrap an existing shared connection
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn pk_info(&self, table: &str) -> Result<Option<(String, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))
            .map_err(engine_error)?;
        let mut rows = stmt.query([]).map_err(engine_error)?;
        while let Some(row) = rows.next().map_err(engine_error)? {
            let pk: i64 = row.get("pk").map_err(engine_error)?;
            if pk > 0 {
                let name: String = row.get("name").map_err(engine_error)?;
                let ty: String = row.get("type").map_err(engine_error)?;
                return Ok(Some((name, ty)));
            }
        }
        Ok(None)
    }
}

impl QueryEngine for SqliteEngine {
    fn execute(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql).map_err(engine_error)
    }

    fn explain(&self, sql: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.prepare(&format!("EXPLAIN {}", sql))
            .map(|_| ())
            .map_err(engine_error)
    }

    fn primary_key_column(&self, table: &str) -> Result<String> {
        match self.pk_info(table)? {
            Some((name, _)) => Ok(name),
            None => Err(Error::Engine(format!(
                "table {} has no primary key",
                table
            ))),
        }
    }

    fn select_row(&self, sql: &str) -> Result<Option<Row>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql).map_err(engine_error)?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = stmt.query([]).map_err(engine_error)?;
        let Some(row) = rows.next().map_err(engine_error)? else {
            return Ok(None);
        };
        let mut result = Row::new();
        for (i, name) in names.iter().enumerate() {
            let text = match row.get_ref(i).map_err(engine_error)? {
                ValueRef::Null => String::new(),
                ValueRef::Integer(v) => v.to_string(),
                ValueRef::Real(v) => v.to_string(),
                ValueRef::Text(v) => String::from_utf8_lossy(v).into_owned(),
                ValueRef::Blob(v) => hex::encode(v),
            };
            result.insert(name.clone(), text);
        }
        Ok(Some(result))
    }

    fn next_key_value(&self, table: &str) -> Result<Option<String>> {
        let Some((pk, ty)) = self.pk_info(table)? else {
            return Ok(None);
        };
        if !ty.to_uppercase().contains("INT") {
            return Ok(None);
        }
        let conn = self.conn.lock();
        let max: Option<i64> = conn
            .query_row(
                &format!(
                    "SELECT MAX({}) FROM {}",
                    quote_ident(&pk),
                    quote_ident(table)
                ),
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(engine_error)?
            .flatten();
        Ok(Some((max.unwrap_or(0) + 1).to_string()))
    }
}

fn engine_error(err: rusqlite::Error) -> Error {
    Error::Engine(err.to_string())
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
