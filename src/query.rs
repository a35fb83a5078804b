//! Query building for telemetry records
//!
//! Turns one telemetry record into one positional INSERT tuple. Dispatch is
//! by record kind, then by schema version, and the version match is
//! exhaustive: an unrecognized tag is an error, never a short or empty tuple.
//!
//! Tuple order must match the destination table's declared column order per
//! schema version; the engine reports a mismatch as an execution failure.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::connection::Backend;
use crate::error::{Error, Result};
use crate::record::{EventTelemetryRecord, SchemaVersion, ScriptTelemetryRecord};
use crate::security::validate_sql_identifier;
use crate::types::Value;

/// Clock portion of a free-form legacy time string
static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+:\d+:\d+)").expect("valid clock pattern"));

/// Extract the `H:M:S` portion from a free-form time string.
///
/// Legacy records carry times like `"10:36:58 AM"` or `"Tuesday 10:36:58"`;
/// only the clock part is persisted. A string with no clock portion extracts
/// as empty.
pub fn extract_clock_time(time: &str) -> &str {
    CLOCK_RE
        .captures(time)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or("")
}

/// Generate a fresh record id from the OS RNG.
///
/// RNG failure means the execution environment is corrupted; it surfaces as
/// a fatal error that callers must not retry.
pub fn new_record_id() -> Result<Uuid> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| Error::record_id(format!("OS random source unavailable: {}", e)))?;
    Ok(uuid::Builder::from_random_bytes(bytes).into_uuid())
}

/// One single-row INSERT, ready to render for any backend
#[derive(Debug, Clone)]
pub struct InsertStatement {
    table: String,
    values: Vec<Value>,
}

impl InsertStatement {
    fn new(table: &str, values: Vec<Value>) -> Result<Self> {
        validate_sql_identifier(table)?;
        Ok(Self {
            table: table.to_string(),
            values,
        })
    }

    /// Target table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Ordered parameter values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// Render the SQL text with the backend's placeholder syntax.
    ///
    /// The text is value-independent; the values are bound separately.
    pub fn sql_for(&self, backend: Backend) -> String {
        backend.dialect().insert_sql(&self.table, self.values.len())
    }
}

/// Build the INSERT for one script-execution record.
pub fn script_insert(table: &str, record: &ScriptTelemetryRecord) -> Result<InsertStatement> {
    let values = match &record.meta.schema_version {
        SchemaVersion::Legacy => legacy_script_values(record)?,
        SchemaVersion::V2 => v2_script_values(record)?,
        SchemaVersion::Other(tag) => {
            return Err(Error::query_build(format!(
                "unsupported script record schema version '{}'",
                tag
            )));
        }
    };

    debug!(
        table,
        schema = record.meta.schema_version.as_str(),
        arity = values.len(),
        "built script insert"
    );
    InsertStatement::new(table, values)
}

/// Build the INSERT for one application event record.
pub fn event_insert(table: &str, record: &EventTelemetryRecord) -> Result<InsertStatement> {
    let values = match &record.meta.schema_version {
        SchemaVersion::V2 => vec![
            Value::Uuid(new_record_id()?),
            Value::from(record.timestamp.as_str()),
            Value::from(record.event_type.as_str()),
            Value::from(record.username.as_str()),
        ],
        other => {
            return Err(Error::query_build(format!(
                "unsupported event record schema version '{}'",
                other.as_str()
            )));
        }
    };

    debug!(table, arity = values.len(), "built event insert");
    InsertStatement::new(table, values)
}

fn command_results_json(record: &ScriptTelemetryRecord) -> Result<Value> {
    let json = serde_json::to_value(&record.command_results)
        .map_err(|e| Error::query_build(format!("command results not serializable: {}", e)))?;
    Ok(Value::Json(json))
}

/// Legacy layout: 19 values, no record id, no execution-context flags.
fn legacy_script_values(record: &ScriptTelemetryRecord) -> Result<Vec<Value>> {
    Ok(vec![
        Value::from(record.date.as_str()),
        Value::from(extract_clock_time(&record.time)),
        Value::from(record.username.as_str()),
        Value::from(record.app_version.as_str()),
        Value::from(record.app_build.as_str()),
        Value::from(record.session_id.as_str()),
        Value::from(record.tool_version.as_str()),
        Value::from(record.debug_mode),
        Value::from(record.config_mode),
        Value::from(record.command_name.as_str()),
        Value::from(record.bundle_name.as_str()),
        Value::from(record.extension_name.as_str()),
        Value::from(record.command_unique_name.as_str()),
        Value::from(record.result_code),
        command_results_json(record)?,
        Value::from(record.script_path.as_str()),
        Value::from(record.trace.engine.version.as_str()),
        Value::from(record.trace.interpreter_dump.as_str()),
        Value::from(record.trace.runtime_dump.as_str()),
    ])
}

/// `"2.0"` layout: 25 values, fresh record id first.
fn v2_script_values(record: &ScriptTelemetryRecord) -> Result<Vec<Value>> {
    Ok(vec![
        Value::Uuid(new_record_id()?),
        Value::from(record.timestamp.as_str()),
        Value::from(record.username.as_str()),
        Value::from(record.app_version.as_str()),
        Value::from(record.app_build.as_str()),
        Value::from(record.session_id.as_str()),
        Value::from(record.tool_version.as_str()),
        Value::from(record.clone_name.as_str()),
        Value::from(record.debug_mode),
        Value::from(record.config_mode),
        Value::from(record.from_gui),
        Value::from(record.clean_engine),
        Value::from(record.fullframe_engine),
        Value::from(record.command_name.as_str()),
        Value::from(record.bundle_name.as_str()),
        Value::from(record.extension_name.as_str()),
        Value::from(record.command_unique_name.as_str()),
        Value::from(record.document_name.as_str()),
        Value::from(record.document_path.as_str()),
        Value::from(record.result_code),
        command_results_json(record)?,
        Value::from(record.script_path.as_str()),
        Value::from(record.trace.engine.kind.as_str()),
        Value::from(record.trace.engine.version.as_str()),
        Value::from(record.trace.message.as_str()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordMeta;

    fn v2_script() -> ScriptTelemetryRecord {
        ScriptTelemetryRecord {
            meta: RecordMeta {
                schema_version: SchemaVersion::V2,
            },
            timestamp: "2026-08-28T10:15:30Z".into(),
            username: "alice".into(),
            command_name: "Sync".into(),
            result_code: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_clock_time() {
        assert_eq!(extract_clock_time("10:36:58"), "10:36:58");
        assert_eq!(extract_clock_time("10:36:58 AM"), "10:36:58");
        assert_eq!(extract_clock_time("Tuesday 1:2:3 evening"), "1:2:3");
        assert_eq!(extract_clock_time("no clock here"), "");
        assert_eq!(extract_clock_time(""), "");
    }

    #[test]
    fn test_new_record_id_unique() {
        let a = new_record_id().unwrap();
        let b = new_record_id().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }

    #[test]
    fn test_v2_script_arity() {
        let stmt = script_insert("scripts", &v2_script()).unwrap();
        assert_eq!(stmt.arity(), 25);
        // record id leads the tuple
        assert!(matches!(stmt.values()[0], Value::Uuid(_)));
        assert_eq!(stmt.values()[1].as_str(), Some("2026-08-28T10:15:30Z"));
    }

    #[test]
    fn test_legacy_script_arity() {
        let mut rec = v2_script();
        rec.meta.schema_version = SchemaVersion::Legacy;
        rec.date = "2026-08-28".into();
        rec.time = "10:36:58 AM".into();

        let stmt = script_insert("scripts", &rec).unwrap();
        assert_eq!(stmt.arity(), 19);
        // no record id; date leads, extracted clock time second
        assert_eq!(stmt.values()[0].as_str(), Some("2026-08-28"));
        assert_eq!(stmt.values()[1].as_str(), Some("10:36:58"));
    }

    #[test]
    fn test_event_arity() {
        let rec = EventTelemetryRecord {
            meta: RecordMeta {
                schema_version: SchemaVersion::V2,
            },
            timestamp: "t".into(),
            event_type: "doc-opened".into(),
            username: "bob".into(),
        };

        let stmt = event_insert("events", &rec).unwrap();
        assert_eq!(stmt.arity(), 4);
        assert_eq!(stmt.values()[2].as_str(), Some("doc-opened"));
    }

    #[test]
    fn test_unknown_schema_rejected() {
        let mut rec = v2_script();
        rec.meta.schema_version = SchemaVersion::Other("3.1".into());
        let err = script_insert("scripts", &rec).unwrap_err();
        assert!(matches!(err, Error::QueryBuild { .. }));

        // events have no legacy layout
        let ev = EventTelemetryRecord::default();
        let err = event_insert("events", &ev).unwrap_err();
        assert!(matches!(err, Error::QueryBuild { .. }));
    }

    #[test]
    fn test_bad_table_name_rejected() {
        let err = script_insert("x; DROP TABLE scripts--", &v2_script()).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_sql_rendering_per_backend() {
        let stmt = event_insert(
            "events",
            &EventTelemetryRecord {
                meta: RecordMeta {
                    schema_version: SchemaVersion::V2,
                },
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(
            stmt.sql_for(Backend::Postgres),
            "INSERT INTO events VALUES ($1, $2, $3, $4);\n"
        );
        assert_eq!(
            stmt.sql_for(Backend::Sqlite),
            "INSERT INTO events VALUES (?, ?, ?, ?);\n"
        );
        assert_eq!(
            stmt.sql_for(Backend::SqlServer),
            "INSERT INTO events VALUES (@P1, @P2, @P3, @P4);\n"
        );
    }

    #[test]
    fn test_sql_text_is_value_independent() {
        let mut rec = v2_script();
        rec.command_name = "x'); DROP TABLE scripts;--".into();
        rec.command_results
            .insert("note".into(), serde_json::json!("it's; quoted"));

        let stmt = script_insert("scripts", &rec).unwrap();
        let sql = stmt.sql_for(Backend::Sqlite);
        assert!(!sql.contains("DROP"));
        assert!(!sql.contains('\''));
    }
}
