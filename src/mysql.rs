//! MySQL backend adapter (mysql_async)
//!
//! mysql_async wants `mysql://` URLs; configurations that carry a bare
//! `user:pass@host/db` remainder get the scheme prepended here. The driver
//! handle requires `&mut` access, so it lives behind a `tokio::sync::Mutex`
//! shared between the connection and its transaction.

use std::sync::Arc;

use async_trait::async_trait;
use mysql_async::prelude::*;
use tokio::sync::Mutex;
use tracing::trace;

use crate::connection::{Connection, Transaction};
use crate::error::{Error, Result};
use crate::types::{Row, Value};

type SharedHandle = Arc<Mutex<Option<mysql_async::Conn>>>;

fn value_to_sql(value: &Value) -> mysql_async::Value {
    use mysql_async::Value as Sql;
    match value {
        Value::Null => Sql::NULL,
        Value::Bool(b) => Sql::Int(i64::from(*b)),
        Value::Int32(n) => Sql::Int(i64::from(*n)),
        Value::Int64(n) => Sql::Int(*n),
        Value::Float64(n) => Sql::Double(*n),
        Value::String(s) => Sql::Bytes(s.clone().into_bytes()),
        Value::Uuid(u) => Sql::Bytes(u.to_string().into_bytes()),
        Value::Json(j) => Sql::Bytes(j.to_string().into_bytes()),
    }
}

fn sql_to_value(value: &mysql_async::Value) -> Value {
    use mysql_async::Value as Sql;
    match value {
        Sql::NULL => Value::Null,
        Sql::Int(n) => Value::Int64(*n),
        // values past i64::MAX keep their decimal form instead of wrapping
        Sql::UInt(n) => i64::try_from(*n)
            .map(Value::Int64)
            .unwrap_or_else(|_| Value::String(n.to_string())),
        Sql::Float(f) => Value::Float64(f64::from(*f)),
        Sql::Double(f) => Value::Float64(*f),
        Sql::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
        other => Value::String(other.as_sql(true)),
    }
}

fn mysql_row_to_row(row: &mysql_async::Row) -> Row {
    let columns: Vec<String> = row
        .columns_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();

    let values: Vec<Value> = (0..columns.len())
        .map(|i| row.as_ref(i).map(sql_to_value).unwrap_or(Value::Null))
        .collect();

    Row::new(columns, values)
}

fn to_params(params: &[Value]) -> mysql_async::Params {
    if params.is_empty() {
        mysql_async::Params::Empty
    } else {
        mysql_async::Params::Positional(params.iter().map(value_to_sql).collect())
    }
}

/// MySQL connection
pub struct MySqlConnection {
    handle: SharedHandle,
}

impl MySqlConnection {
    /// Connect to a `mysql://` URL (scheme added if absent)
    pub async fn open(dsn: &str) -> Result<Self> {
        let url = if dsn.contains("://") {
            dsn.to_string()
        } else {
            format!("mysql://{}", dsn)
        };

        let opts = mysql_async::Opts::from_url(&url)
            .map_err(|e| Error::connection_with_source("invalid mysql DSN", e))?;
        let conn = mysql_async::Conn::new(opts)
            .await
            .map_err(|e| Error::connection_with_source("mysql connect", e))?;

        trace!("mysql connection opened");
        Ok(Self {
            handle: Arc::new(Mutex::new(Some(conn))),
        })
    }
}

async fn exec_on(handle: &SharedHandle, sql: &str, params: &[Value]) -> Result<u64> {
    let mut guard = handle.lock().await;
    let conn = guard
        .as_mut()
        .ok_or_else(|| Error::connection("connection is closed"))?;

    conn.exec_drop(sql, to_params(params))
        .await
        .map_err(|e| Error::execution_with_sql(e.to_string(), sql))?;
    Ok(conn.affected_rows())
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut guard = self.handle.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::connection("connection is closed"))?;

        let rows: Vec<mysql_async::Row> = conn
            .exec(sql, to_params(params))
            .await
            .map_err(|e| Error::execution_with_sql(e.to_string(), sql))?;

        Ok(rows.iter().map(mysql_row_to_row).collect())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        exec_on(&self.handle, sql, params).await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        {
            let mut guard = self.handle.lock().await;
            let conn = guard
                .as_mut()
                .ok_or_else(|| Error::connection("connection is closed"))?;
            conn.exec_drop("START TRANSACTION", mysql_async::Params::Empty)
                .await
                .map_err(|e| Error::Transaction {
                    message: e.to_string(),
                    source: Some(Box::new(e)),
                })?;
        }
        trace!("mysql transaction started");
        Ok(Box::new(MySqlTransaction {
            handle: Arc::clone(&self.handle),
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.handle.lock().await;
        if let Some(conn) = guard.take() {
            conn.disconnect()
                .await
                .map_err(|e| Error::connection_with_source("mysql disconnect", e))?;
        }
        Ok(())
    }
}

/// MySQL transaction over the shared handle
struct MySqlTransaction {
    handle: SharedHandle,
}

impl MySqlTransaction {
    async fn finish(&self, sql: &'static str) -> Result<()> {
        let mut guard = self.handle.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::connection("connection is closed"))?;
        conn.exec_drop(sql, mysql_async::Params::Empty)
            .await
            .map_err(|e| Error::Transaction {
                message: e.to_string(),
                source: Some(Box::new(e)),
            })
    }
}

#[async_trait]
impl Transaction for MySqlTransaction {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        exec_on(&self.handle, sql, params).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}
