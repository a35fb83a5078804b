//! Transactional write execution
//!
//! One write walks a fixed state machine:
//! Idle -> ConnectionOpen -> TransactionOpen -> Executed -> Committed | RolledBack.
//!
//! A failed execute rolls back before the error is returned; the connection
//! is closed on every exit path. Single attempt, no retries, no timeouts.

use tracing::{debug, warn};

use crate::connection::{self, Backend, Connection};
use crate::error::Result;
use crate::query::InsertStatement;
use crate::types::Value;

/// Success payload of one committed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    message: String,
    rows_affected: u64,
}

impl WriteReport {
    fn new(table: &str, backend: Backend, rows_affected: u64) -> Self {
        Self {
            message: format!(
                "successfully inserted usage record into {} ({})",
                table, backend
            ),
            rows_affected,
        }
    }

    /// Human-readable confirmation message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Rows written by the statement
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}

/// Open a connection, run the statement in a transaction, and commit.
pub async fn commit_insert(
    backend: Backend,
    dsn: &str,
    statement: &InsertStatement,
) -> Result<WriteReport> {
    let sql = statement.sql_for(backend);
    let conn = connection::open(backend, dsn).await?;

    let outcome = run_in_transaction(conn.as_ref(), &sql, statement.values()).await;

    if let Err(e) = conn.close().await {
        warn!(error = %e, "failed to close connection after write");
    }

    let rows_affected = outcome?;
    debug!(table = statement.table(), rows_affected, "write committed");
    Ok(WriteReport::new(statement.table(), backend, rows_affected))
}

async fn run_in_transaction(conn: &dyn Connection, sql: &str, params: &[Value]) -> Result<u64> {
    let tx = conn.begin().await?;

    match tx.execute(sql, params).await {
        Ok(rows_affected) => {
            tx.commit().await?;
            Ok(rows_affected)
        }
        Err(exec_err) => {
            // Surface the execute failure; a rollback failure only gets logged
            if let Err(rb_err) = tx.rollback().await {
                warn!(error = %rb_err, "rollback failed after execute error");
            }
            Err(exec_err)
        }
    }
}
