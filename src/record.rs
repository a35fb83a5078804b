//! Telemetry record data model
//!
//! Two record kinds arrive from upstream producers: script-execution records
//! and generic application events. Each carries a schema-version discriminant
//! that selects its field layout. Records are read-only inputs here; nothing
//! is retained past a single write call.

use serde::{Deserialize, Serialize};

/// Schema-version discriminant carried by every record.
///
/// The wire format is a plain string tag: legacy script records carry no tag
/// (empty string), current records carry `"2.0"`. Anything else is preserved
/// verbatim in `Other` so unrecognized tags can be rejected explicitly rather
/// than falling through to an empty tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SchemaVersion {
    /// Pre-versioning layout (empty tag); script records only
    Legacy,
    /// Current `"2.0"` layout
    V2,
    /// Unrecognized tag, preserved for error reporting
    Other(String),
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::Legacy
    }
}

impl From<String> for SchemaVersion {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "" => Self::Legacy,
            "2.0" => Self::V2,
            _ => Self::Other(tag),
        }
    }
}

impl From<SchemaVersion> for String {
    fn from(v: SchemaVersion) -> Self {
        match v {
            SchemaVersion::Legacy => String::new(),
            SchemaVersion::V2 => "2.0".to_string(),
            SchemaVersion::Other(tag) => tag,
        }
    }
}

impl SchemaVersion {
    /// The wire tag for this version
    pub fn as_str(&self) -> &str {
        match self {
            Self::Legacy => "",
            Self::V2 => "2.0",
            Self::Other(tag) => tag.as_str(),
        }
    }
}

/// Record metadata envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordMeta {
    /// Schema-version discriminant selecting the field layout
    pub schema_version: SchemaVersion,
}

/// Script engine information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineInfo {
    /// Engine kind (trace engine type); `"2.0"` only
    pub kind: String,
    /// Engine version
    pub version: String,
}

/// Execution trace attached to a script record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceInfo {
    /// Engine that executed the script
    pub engine: EngineInfo,
    /// Trace message; `"2.0"` only
    pub message: String,
    /// Interpreter trace dump; legacy only
    pub interpreter_dump: String,
    /// Runtime trace dump; legacy only
    pub runtime_dump: String,
}

/// One script-execution telemetry record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptTelemetryRecord {
    /// Metadata envelope with the schema version
    pub meta: RecordMeta,
    /// Execution date; legacy layout
    pub date: String,
    /// Free-form time string; legacy layout extracts the `H:M:S` portion
    pub time: String,
    /// Full timestamp, used verbatim; `"2.0"` layout
    pub timestamp: String,
    /// User that ran the script
    pub username: String,
    /// Host application version
    pub app_version: String,
    /// Host application build
    pub app_build: String,
    /// Session identifier
    pub session_id: String,
    /// Tool version
    pub tool_version: String,
    /// Tool clone marker; `"2.0"` only
    pub clone_name: String,
    /// Whether the script ran in debug mode
    pub debug_mode: bool,
    /// Whether the script ran in config mode
    pub config_mode: bool,
    /// Whether execution was triggered from the GUI; `"2.0"` only
    pub from_gui: bool,
    /// Whether the script requested a clean engine; `"2.0"` only
    pub clean_engine: bool,
    /// Whether the script requested a full-frame engine; `"2.0"` only
    pub fullframe_engine: bool,
    /// Command name
    pub command_name: String,
    /// Bundle name
    pub bundle_name: String,
    /// Extension name
    pub extension_name: String,
    /// Command unique name
    pub command_unique_name: String,
    /// Open document name; `"2.0"` only
    pub document_name: String,
    /// Open document path; `"2.0"` only
    pub document_path: String,
    /// Execution result code
    pub result_code: i32,
    /// Structured command results, serialized to JSON for persistence
    pub command_results: serde_json::Map<String, serde_json::Value>,
    /// Path of the executed script
    pub script_path: String,
    /// Execution trace
    pub trace: TraceInfo,
}

/// One generic application event record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventTelemetryRecord {
    /// Metadata envelope with the schema version
    pub meta: RecordMeta,
    /// Event timestamp, used verbatim
    pub timestamp: String,
    /// Event type name
    pub event_type: String,
    /// User the event belongs to
    pub username: String,
}
