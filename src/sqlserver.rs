//! SQL Server backend adapter (tiberius)
//!
//! The DSN is an ADO.NET connection string handed to tiberius verbatim
//! (`Server=...;Database=...;User Id=...;Password=...`). Parameters are bound
//! as typed TDS protocol parameters, never interpolated into SQL text.

use std::sync::Arc;

use async_trait::async_trait;
use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::trace;

use crate::connection::{Connection, Transaction};
use crate::error::{Error, Result};
use crate::types::{Row, Value};

type SharedClient = Arc<Mutex<Option<Client<Compat<TcpStream>>>>>;

/// Owned parameter wrapper for typed TDS binding
struct SqlParam(Value);

impl tiberius::ToSql for SqlParam {
    fn to_sql(&self) -> tiberius::ColumnData<'_> {
        use std::borrow::Cow;
        use tiberius::ColumnData;

        match &self.0 {
            Value::Null => ColumnData::String(None),
            Value::Bool(b) => ColumnData::Bit(Some(*b)),
            Value::Int32(n) => ColumnData::I32(Some(*n)),
            Value::Int64(n) => ColumnData::I64(Some(*n)),
            Value::Float64(n) => ColumnData::F64(Some(*n)),
            Value::String(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
            Value::Uuid(u) => ColumnData::Guid(Some(*u)),
            Value::Json(j) => ColumnData::String(Some(Cow::Owned(j.to_string()))),
        }
    }
}

fn column_data_to_value(data: tiberius::ColumnData<'_>) -> Value {
    use tiberius::ColumnData;

    match data {
        ColumnData::Bit(Some(b)) => Value::Bool(b),
        ColumnData::I16(Some(n)) => Value::Int32(i32::from(n)),
        ColumnData::I32(Some(n)) => Value::Int32(n),
        ColumnData::I64(Some(n)) => Value::Int64(n),
        ColumnData::F32(Some(f)) => Value::Float64(f64::from(f)),
        ColumnData::F64(Some(f)) => Value::Float64(f),
        ColumnData::String(Some(s)) => Value::String(s.into_owned()),
        ColumnData::Guid(Some(u)) => Value::Uuid(u),
        _ => Value::Null,
    }
}

fn tds_row_to_row(row: tiberius::Row) -> Row {
    let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values: Vec<Value> = row.into_iter().map(column_data_to_value).collect();
    Row::new(columns, values)
}

/// SQL Server connection
pub struct SqlServerConnection {
    client: SharedClient,
}

impl SqlServerConnection {
    /// Connect using an ADO.NET connection string
    pub async fn open(dsn: &str) -> Result<Self> {
        let config = Config::from_ado_string(dsn)
            .map_err(|e| Error::connection_with_source("invalid sqlserver DSN", e))?;

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| Error::connection_with_source("sqlserver connect", e))?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| Error::connection_with_source("sqlserver authenticate", e))?;

        trace!("sqlserver connection opened");
        Ok(Self {
            client: Arc::new(Mutex::new(Some(client))),
        })
    }
}

async fn exec_on(client: &SharedClient, sql: &str, params: &[Value]) -> Result<u64> {
    let mut guard = client.lock().await;
    let conn = guard
        .as_mut()
        .ok_or_else(|| Error::connection("connection is closed"))?;

    let owned: Vec<SqlParam> = params.iter().cloned().map(SqlParam).collect();
    let refs: Vec<&dyn tiberius::ToSql> = owned.iter().map(|p| p as &dyn tiberius::ToSql).collect();

    let result = conn
        .execute(sql, &refs)
        .await
        .map_err(|e| Error::execution_with_sql(e.to_string(), sql))?;
    Ok(result.total())
}

async fn simple_exec(client: &SharedClient, sql: &'static str) -> Result<()> {
    let mut guard = client.lock().await;
    let conn = guard
        .as_mut()
        .ok_or_else(|| Error::connection("connection is closed"))?;

    conn.simple_query(sql)
        .await
        .map_err(|e| Error::Transaction {
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?
        .into_results()
        .await
        .map_err(|e| Error::Transaction {
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;
    Ok(())
}

#[async_trait]
impl Connection for SqlServerConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut guard = self.client.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::connection("connection is closed"))?;

        let owned: Vec<SqlParam> = params.iter().cloned().map(SqlParam).collect();
        let refs: Vec<&dyn tiberius::ToSql> =
            owned.iter().map(|p| p as &dyn tiberius::ToSql).collect();

        let stream = conn
            .query(sql, &refs)
            .await
            .map_err(|e| Error::execution_with_sql(e.to_string(), sql))?;
        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| Error::execution_with_sql(e.to_string(), sql))?;

        Ok(rows.into_iter().map(tds_row_to_row).collect())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        exec_on(&self.client, sql, params).await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        simple_exec(&self.client, "BEGIN TRANSACTION").await?;
        trace!("sqlserver transaction started");
        Ok(Box::new(SqlServerTransaction {
            client: Arc::clone(&self.client),
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.take() {
            client
                .close()
                .await
                .map_err(|e| Error::connection_with_source("sqlserver close", e))?;
        }
        Ok(())
    }
}

/// SQL Server transaction over the shared client
struct SqlServerTransaction {
    client: SharedClient,
}

#[async_trait]
impl Transaction for SqlServerTransaction {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        exec_on(&self.client, sql, params).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        simple_exec(&self.client, "COMMIT TRANSACTION").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        simple_exec(&self.client, "ROLLBACK TRANSACTION").await
    }
}
