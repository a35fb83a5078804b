//! # telesink
//!
//! Transactional relational persistence for telemetry records.
//!
//! This crate converts structured telemetry records (script executions and
//! application events) into backend-specific SQL writes and commits them
//! transactionally against one of several relational engines.
//!
//! ## Features
//!
//! - **Multi-Database Support**: SQLite, MySQL, PostgreSQL, SQL Server with
//!   a unified API
//! - **Schema Reconciliation**: two independently evolving record layouts
//!   mapped to positional value tuples, with unknown versions rejected
//!   before any connection is opened
//! - **Parameterized Statements**: values are always bound as typed
//!   parameters, never interpolated into SQL text
//! - **All-or-Nothing Writes**: connect, begin, execute, commit per call,
//!   with rollback on failure and guaranteed connection release
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use telesink::prelude::*;
//!
//! let store = TelemetryStore::new(
//!     StoreConfig::new(Backend::Sqlite, "sqlite:/var/db/usage.db")
//!         .with_script_table("scripts")
//!         .with_event_table("events"),
//! )?;
//!
//! let record: ScriptTelemetryRecord = serde_json::from_str(payload)?;
//! let report = store.write_script(&record).await?;
//! println!("{}", report.message());
//! ```
//!
//! ## Feature Flags
//!
//! - `sqlite` - SQLite support via rusqlite (default)
//! - `postgres` - PostgreSQL support via tokio-postgres
//! - `mysql` - MySQL/MariaDB support via mysql_async
//! - `sqlserver` - SQL Server support via tiberius
//! - `full` - All backends enabled

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod connection;
pub mod dialect;
pub mod error;
pub mod query;
pub mod record;
pub mod security;
pub mod store;
pub mod types;
pub mod writer;

// Backend implementations (conditionally compiled)
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "sqlserver")]
pub mod sqlserver;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{Error, ErrorCategory, Result};

    // Value and type system
    pub use crate::types::{Row, Value};

    // Record model
    pub use crate::record::{
        EngineInfo, EventTelemetryRecord, RecordMeta, SchemaVersion, ScriptTelemetryRecord,
        TraceInfo,
    };

    // Connection abstractions
    pub use crate::connection::{Backend, Connection, Transaction};

    // Dialects
    pub use crate::dialect::{
        MySqlDialect, PostgresDialect, SqlDialect, SqlServerDialect, SqliteDialect,
    };

    // Query building and writing
    pub use crate::query::InsertStatement;
    pub use crate::store::{StoreConfig, TelemetryStore};
    pub use crate::writer::WriteReport;
}

// Re-export commonly used items at crate root
pub use error::{Error, Result};
pub use types::Value;
