//! PostgreSQL backend adapter (tokio-postgres)
//!
//! The DSN passes through untouched: tokio-postgres accepts both libpq-style
//! key/value strings and `postgres://` URLs. The connection driver task is
//! spawned onto the runtime and winds down when the client is dropped.
//!
//! UUID and JSON values are bound as text parameters: the upstream table
//! schemas declare TEXT columns for record ids and command results, and the
//! driver rejects native `uuid`/`json` parameters against those. Reads from
//! native UUID/JSON columns still map back to the typed variants.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_postgres::NoTls;
use tracing::{trace, warn};

use crate::connection::{Connection, Transaction};
use crate::error::{Error, Result};
use crate::types::{Row, Value};

fn value_to_sql(value: &Value) -> Box<dyn tokio_postgres::types::ToSql + Sync + Send> {
    match value {
        Value::Null => Box::new(Option::<String>::None),
        Value::Bool(b) => Box::new(*b),
        Value::Int32(n) => Box::new(*n),
        Value::Int64(n) => Box::new(*n),
        Value::Float64(n) => Box::new(*n),
        Value::String(s) => Box::new(s.clone()),
        // TEXT columns upstream; see module docs
        Value::Uuid(u) => Box::new(u.to_string()),
        Value::Json(j) => Box::new(j.to_string()),
    }
}

fn param_refs(
    boxed: &[Box<dyn tokio_postgres::types::ToSql + Sync + Send>],
) -> Vec<&(dyn tokio_postgres::types::ToSql + Sync)> {
    boxed
        .iter()
        .map(|b| b.as_ref() as &(dyn tokio_postgres::types::ToSql + Sync))
        .collect()
}

fn pg_row_to_row(pg_row: &tokio_postgres::Row) -> Row {
    let columns: Vec<String> = pg_row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let values: Vec<Value> = pg_row
        .columns()
        .iter()
        .enumerate()
        .map(|(i, col)| pg_value_to_value(pg_row, i, col.type_()))
        .collect();

    Row::new(columns, values)
}

fn pg_value_to_value(
    row: &tokio_postgres::Row,
    idx: usize,
    pg_type: &tokio_postgres::types::Type,
) -> Value {
    use tokio_postgres::types::Type;

    match *pg_type {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map(Value::Int32)
            .unwrap_or(Value::Null),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map(Value::Int64)
            .unwrap_or(Value::Null),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map(Value::Float64)
            .unwrap_or(Value::Null),
        Type::UUID => row
            .try_get::<_, Option<uuid::Uuid>>(idx)
            .ok()
            .flatten()
            .map(Value::Uuid)
            .unwrap_or(Value::Null),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// PostgreSQL connection
pub struct PostgresConnection {
    client: Arc<tokio_postgres::Client>,
    closed: AtomicBool,
}

impl PostgresConnection {
    /// Connect and spawn the connection driver task
    pub async fn open(dsn: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(dsn, NoTls)
            .await
            .map_err(|e| Error::connection_with_source("postgres connect", e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "postgres connection task ended with error");
            }
        });

        trace!("postgres connection opened");
        Ok(Self {
            client: Arc::new(client),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::connection("connection is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.ensure_open()?;

        let boxed: Vec<_> = params.iter().map(value_to_sql).collect();
        let rows = self
            .client
            .query(sql, &param_refs(&boxed))
            .await
            .map_err(|e| Error::execution_with_sql(e.to_string(), sql))?;

        Ok(rows.iter().map(pg_row_to_row).collect())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.ensure_open()?;

        let boxed: Vec<_> = params.iter().map(value_to_sql).collect();
        self.client
            .execute(sql, &param_refs(&boxed))
            .await
            .map_err(|e| Error::execution_with_sql(e.to_string(), sql))
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        self.ensure_open()?;

        self.client
            .execute("BEGIN", &[])
            .await
            .map_err(|e| Error::Transaction {
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;

        Ok(Box::new(PostgresTransaction {
            client: Arc::clone(&self.client),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// PostgreSQL transaction over the shared client
struct PostgresTransaction {
    client: Arc<tokio_postgres::Client>,
}

impl PostgresTransaction {
    async fn finish(&self, sql: &'static str) -> Result<()> {
        self.client
            .execute(sql, &[])
            .await
            .map(|_| ())
            .map_err(|e| Error::Transaction {
                message: e.to_string(),
                source: Some(Box::new(e)),
            })
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let boxed: Vec<_> = params.iter().map(value_to_sql).collect();
        self.client
            .execute(sql, &param_refs(&boxed))
            .await
            .map_err(|e| Error::execution_with_sql(e.to_string(), sql))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use tokio_postgres::types::{IsNull, ToSql, Type};

    fn encode(value: &Value, ty: &Type) -> (IsNull, BytesMut) {
        let param = value_to_sql(value);
        let mut buf = BytesMut::new();
        let is_null = param.to_sql_checked(ty, &mut buf).unwrap();
        (is_null, buf)
    }

    #[test]
    fn test_null_binds_as_null() {
        let (is_null, buf) = encode(&Value::Null, &Type::TEXT);
        assert!(matches!(is_null, IsNull::Yes));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_scalar_bindings() {
        let (_, buf) = encode(&Value::Bool(true), &Type::BOOL);
        assert_eq!(&buf[..], [1]);

        let (_, buf) = encode(&Value::Int32(42), &Type::INT4);
        assert_eq!(&buf[..], 42_i32.to_be_bytes());

        let (_, buf) = encode(&Value::Int64(-7), &Type::INT8);
        assert_eq!(&buf[..], (-7_i64).to_be_bytes());

        let (_, buf) = encode(&Value::Float64(1.5), &Type::FLOAT8);
        assert_eq!(&buf[..], 1.5_f64.to_be_bytes());
    }

    #[test]
    fn test_text_bindings() {
        let (_, buf) = encode(&Value::String("alice".into()), &Type::TEXT);
        assert_eq!(&buf[..], b"alice");

        // ids and command results go to TEXT columns as their string forms
        let id = uuid::Uuid::new_v4();
        let (_, buf) = encode(&Value::Uuid(id), &Type::TEXT);
        assert_eq!(&buf[..], id.to_string().as_bytes());

        let (_, buf) = encode(
            &Value::Json(serde_json::json!({"k": "v'; --"})),
            &Type::TEXT,
        );
        assert_eq!(&buf[..], br#"{"k":"v'; --"}"#);
    }
}
