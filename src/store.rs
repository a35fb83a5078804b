//! Telemetry store facade
//!
//! Entry points for persisting telemetry: one write operation per record
//! kind. Statements are built before any connection is opened, so malformed
//! records and unknown schema tags fail fast without touching the network.

use std::fmt;

use tracing::debug;

use crate::connection::Backend;
use crate::error::Result;
use crate::query;
use crate::record::{EventTelemetryRecord, ScriptTelemetryRecord};
use crate::security::validate_sql_identifier;
use crate::writer::{self, WriteReport};

/// Store configuration: backend, DSN, and the two destination tables
#[derive(Clone)]
pub struct StoreConfig {
    /// Target database engine
    pub backend: Backend,
    /// Connection string, in the backend's native convention
    pub dsn: String,
    /// Destination table for script-execution records
    pub script_table: String,
    /// Destination table for application event records
    pub event_table: String,
}

impl StoreConfig {
    /// Create a configuration with the conventional table names
    pub fn new(backend: Backend, dsn: impl Into<String>) -> Self {
        Self {
            backend,
            dsn: dsn.into(),
            script_table: "scripts".to_string(),
            event_table: "events".to_string(),
        }
    }

    /// Set the script record table
    pub fn with_script_table(mut self, table: impl Into<String>) -> Self {
        self.script_table = table.into();
        self
    }

    /// Set the event record table
    pub fn with_event_table(mut self, table: impl Into<String>) -> Self {
        self.event_table = table.into();
        self
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Redact credentials from the DSN to prevent leaking passwords to logs.
        let redacted_dsn = match url::Url::parse(&self.dsn) {
            Ok(mut parsed) => {
                if parsed.password().is_some() {
                    let _ = parsed.set_password(Some("***"));
                }
                parsed.to_string()
            }
            Err(_) => "***".to_string(),
        };

        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("dsn", &redacted_dsn)
            .field("script_table", &self.script_table)
            .field("event_table", &self.event_table)
            .finish()
    }
}

/// Facade over query building and transactional writing
#[derive(Debug, Clone)]
pub struct TelemetryStore {
    config: StoreConfig,
}

impl TelemetryStore {
    /// Create a store, validating the configured table names up front.
    pub fn new(config: StoreConfig) -> Result<Self> {
        validate_sql_identifier(&config.script_table)?;
        validate_sql_identifier(&config.event_table)?;
        Ok(Self { config })
    }

    /// The store configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Persist one script-execution record.
    ///
    /// Query-build errors (unknown schema tag, unserializable command
    /// results) are returned before any connection is opened.
    pub async fn write_script(&self, record: &ScriptTelemetryRecord) -> Result<WriteReport> {
        let statement = query::script_insert(&self.config.script_table, record)?;
        debug!(
            table = %self.config.script_table,
            backend = %self.config.backend,
            "writing script record"
        );
        writer::commit_insert(self.config.backend, &self.config.dsn, &statement).await
    }

    /// Persist one application event record.
    pub async fn write_event(&self, record: &EventTelemetryRecord) -> Result<WriteReport> {
        let statement = query::event_insert(&self.config.event_table, record)?;
        debug!(
            table = %self.config.event_table,
            backend = %self.config.backend,
            "writing event record"
        );
        writer::commit_insert(self.config.backend, &self.config.dsn, &statement).await
    }
}
