//! SQLite backend adapter (rusqlite)
//!
//! rusqlite is synchronous and its handle is `Send` but not `Sync`, so the
//! handle lives behind a `tokio::sync::Mutex`. Writes here are single small
//! statements, so running them inline under the lock is fine. Transactions
//! share the handle and drive BEGIN/COMMIT/ROLLBACK as plain statements.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::connection::{Connection, Transaction};
use crate::error::{Error, Result};
use crate::types::{Row, Value};

type SharedHandle = Arc<Mutex<Option<rusqlite::Connection>>>;

fn value_to_sql(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::Int32(n) => Sql::Integer(i64::from(*n)),
        Value::Int64(n) => Sql::Integer(*n),
        Value::Float64(n) => Sql::Real(*n),
        Value::String(s) => Sql::Text(s.clone()),
        Value::Uuid(u) => Sql::Text(u.to_string()),
        Value::Json(j) => Sql::Text(j.to_string()),
    }
}

fn sql_to_value(value: rusqlite::types::Value) -> Value {
    use rusqlite::types::Value as Sql;
    match value {
        Sql::Null => Value::Null,
        Sql::Integer(n) => Value::Int64(n),
        Sql::Real(f) => Value::Float64(f),
        Sql::Text(s) => Value::String(s),
        Sql::Blob(b) => Value::String(String::from_utf8_lossy(&b).into_owned()),
    }
}

fn run_statement(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[Value],
) -> std::result::Result<usize, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    stmt.execute(rusqlite::params_from_iter(params.iter().map(value_to_sql)))
}

/// SQLite connection
pub struct SqliteConnection {
    handle: SharedHandle,
}

impl SqliteConnection {
    /// Open a database file (or `:memory:`)
    pub async fn open(path: &str) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| Error::connection_with_source(format!("sqlite open '{}'", path), e))?;
        trace!(path, "sqlite connection opened");
        Ok(Self {
            handle: Arc::new(Mutex::new(Some(conn))),
        })
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let guard = self.handle.lock().await;
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::connection("connection is closed"))?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| Error::execution_with_sql(e.to_string(), sql))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter().map(value_to_sql)))
            .map_err(|e| Error::execution_with_sql(e.to_string(), sql))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| Error::execution_with_sql(e.to_string(), sql))?
        {
            let values = (0..columns.len())
                .map(|i| {
                    row.get::<_, rusqlite::types::Value>(i)
                        .map(sql_to_value)
                        .map_err(|e| Error::execution(e.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            out.push(Row::new(columns.clone(), values));
        }
        Ok(out)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let guard = self.handle.lock().await;
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::connection("connection is closed"))?;

        let affected = run_statement(conn, sql, params)
            .map_err(|e| Error::execution_with_sql(e.to_string(), sql))?;
        Ok(affected as u64)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        {
            let guard = self.handle.lock().await;
            let conn = guard
                .as_ref()
                .ok_or_else(|| Error::connection("connection is closed"))?;
            conn.execute_batch("BEGIN").map_err(|e| Error::Transaction {
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;
        }
        trace!("sqlite transaction started");
        Ok(Box::new(SqliteTransaction {
            handle: Arc::clone(&self.handle),
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.handle.lock().await;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| Error::connection_with_source("sqlite close", e))?;
        }
        Ok(())
    }
}

/// SQLite transaction over the shared handle
struct SqliteTransaction {
    handle: SharedHandle,
}

impl SqliteTransaction {
    async fn finish(&self, sql: &'static str) -> Result<()> {
        let guard = self.handle.lock().await;
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::connection("connection is closed"))?;
        conn.execute_batch(sql).map_err(|e| Error::Transaction {
            message: e.to_string(),
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let guard = self.handle.lock().await;
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::connection("connection is closed"))?;

        let affected = run_statement(conn, sql, params)
            .map_err(|e| Error::execution_with_sql(e.to_string(), sql))?;
        Ok(affected as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}
