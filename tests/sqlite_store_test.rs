//! End-to-end writes against a real SQLite database.

#![cfg(feature = "sqlite")]

use telesink::prelude::*;
use telesink::sqlite::SqliteConnection;

const SCRIPTS_DDL: &str = "CREATE TABLE scripts (
    id TEXT, timestamp TEXT, username TEXT, app_version TEXT, app_build TEXT,
    session_id TEXT, tool_version TEXT, clone_name TEXT, debug_mode INTEGER,
    config_mode INTEGER, from_gui INTEGER, clean_engine INTEGER,
    fullframe_engine INTEGER, command_name TEXT, bundle_name TEXT,
    extension_name TEXT, command_unique_name TEXT, document_name TEXT,
    document_path TEXT, result_code INTEGER, command_results TEXT,
    script_path TEXT, engine_kind TEXT, engine_version TEXT, trace_message TEXT
)";

const EVENTS_DDL: &str = "CREATE TABLE events (
    id TEXT, timestamp TEXT, event_type TEXT CHECK (event_type <> ''), username TEXT
)";

struct Db {
    // held for its Drop, which removes the directory
    _dir: tempfile::TempDir,
    path: String,
}

async fn setup_db() -> Db {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("usage.db").to_string_lossy().into_owned();

    let conn = SqliteConnection::open(&path).await.unwrap();
    conn.execute(SCRIPTS_DDL, &[]).await.unwrap();
    conn.execute(EVENTS_DDL, &[]).await.unwrap();
    conn.close().await.unwrap();

    Db { _dir: dir, path }
}

fn store_for(db: &Db) -> TelemetryStore {
    // prefixed DSN exercises normalization: the driver must see the bare path
    TelemetryStore::new(StoreConfig::new(
        Backend::Sqlite,
        format!("sqlite:{}", db.path),
    ))
    .unwrap()
}

fn v2_script() -> ScriptTelemetryRecord {
    let mut command_results = serde_json::Map::new();
    command_results.insert("status".into(), serde_json::json!("ok"));
    command_results.insert(
        "note".into(),
        serde_json::json!("it's done; \"quoted\" -- fine"),
    );

    ScriptTelemetryRecord {
        command_results,
        meta: RecordMeta {
            schema_version: SchemaVersion::V2,
        },
        timestamp: "2026-08-28T10:15:30Z".into(),
        username: "alice".into(),
        app_version: "2026.1".into(),
        app_build: "20260801".into(),
        session_id: "s-42".into(),
        tool_version: "5.1.0".into(),
        command_name: "Sync".into(),
        bundle_name: "sync.pushbutton".into(),
        extension_name: "tools.extension".into(),
        command_unique_name: "tools-sync".into(),
        document_name: "tower.rvt".into(),
        document_path: "C:\\projects\\tower.rvt".into(),
        result_code: 0,
        script_path: "script.py".into(),
        trace: TraceInfo {
            engine: EngineInfo {
                kind: "ironpython".into(),
                version: "2.7.12".into(),
            },
            message: String::new(),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn v2_event(event_type: &str) -> EventTelemetryRecord {
    EventTelemetryRecord {
        meta: RecordMeta {
            schema_version: SchemaVersion::V2,
        },
        timestamp: "2026-08-28T10:15:30Z".into(),
        event_type: event_type.into(),
        username: "bob".into(),
    }
}

#[tokio::test]
async fn script_record_round_trips_by_generated_id() {
    let db = setup_db().await;
    let store = store_for(&db);

    let rec = v2_script();
    let report = store.write_script(&rec).await.unwrap();
    assert_eq!(report.rows_affected(), 1);
    assert!(report.message().contains("successfully inserted"));

    let conn = SqliteConnection::open(&db.path).await.unwrap();

    // generated id is a well-formed v4 UUID
    let ids = conn.query("SELECT id FROM scripts", &[]).await.unwrap();
    let id = ids[0].get_by_name("id").and_then(|v| v.as_uuid()).unwrap();
    assert_eq!(id.get_version_num(), 4);

    // the record is addressable by that id
    let rows = conn
        .query(
            "SELECT * FROM scripts WHERE id = ?",
            &[Value::String(id.to_string())],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    let row = &rows[0];

    assert_eq!(
        row.get_by_name("timestamp").unwrap().as_str(),
        Some("2026-08-28T10:15:30Z")
    );
    assert_eq!(row.get_by_name("username").unwrap().as_str(), Some("alice"));
    assert_eq!(
        row.get_by_name("document_path").unwrap().as_str(),
        Some("C:\\projects\\tower.rvt")
    );
    assert_eq!(row.get_by_name("result_code").unwrap().as_i64(), Some(0));
    assert_eq!(
        row.get_by_name("engine_version").unwrap().as_str(),
        Some("2.7.12")
    );
    // serialized command results survive byte-identical, quotes and semicolons included
    let expected_results = serde_json::to_string(&rec.command_results).unwrap();
    assert_eq!(
        row.get_by_name("command_results").unwrap().as_str(),
        Some(expected_results.as_str())
    );
    // booleans persisted as 0/1
    assert_eq!(row.get_by_name("debug_mode").unwrap().as_i64(), Some(0));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn event_record_round_trips() {
    let db = setup_db().await;
    let store = store_for(&db);

    store.write_event(&v2_event("doc-opened")).await.unwrap();

    let conn = SqliteConnection::open(&db.path).await.unwrap();
    let rows = conn.query("SELECT * FROM events", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get_by_name("event_type").unwrap().as_str(),
        Some("doc-opened")
    );
    assert_eq!(rows[0].get_by_name("username").unwrap().as_str(), Some("bob"));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn legacy_script_record_writes_nineteen_columns() {
    let db = setup_db().await;

    // separate table matching the legacy layout
    let conn = SqliteConnection::open(&db.path).await.unwrap();
    conn.execute(
        "CREATE TABLE legacy_scripts (
            date TEXT, time TEXT, username TEXT, app_version TEXT, app_build TEXT,
            session_id TEXT, tool_version TEXT, debug_mode INTEGER, config_mode INTEGER,
            command_name TEXT, bundle_name TEXT, extension_name TEXT,
            command_unique_name TEXT, result_code INTEGER, command_results TEXT,
            script_path TEXT, engine_version TEXT, interpreter_dump TEXT, runtime_dump TEXT
        )",
        &[],
    )
    .await
    .unwrap();
    conn.close().await.unwrap();

    let store = TelemetryStore::new(
        StoreConfig::new(Backend::Sqlite, format!("sqlite:{}", db.path))
            .with_script_table("legacy_scripts"),
    )
    .unwrap();

    let mut rec = v2_script();
    rec.meta.schema_version = SchemaVersion::Legacy;
    rec.date = "2026-08-28".into();
    rec.time = "around 10:36:58 in the morning".into();

    store.write_script(&rec).await.unwrap();

    let conn = SqliteConnection::open(&db.path).await.unwrap();
    let rows = conn.query("SELECT * FROM legacy_scripts", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].len(), 19);
    assert_eq!(rows[0].get_by_name("time").unwrap().as_str(), Some("10:36:58"));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn failed_execute_rolls_back_and_releases_the_connection() {
    let db = setup_db().await;
    let store = store_for(&db);

    store.write_event(&v2_event("first")).await.unwrap();

    // violates the CHECK constraint on events.event_type
    let err = store.write_event(&v2_event("")).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Execution);
    assert!(!err.is_retriable());

    // row count unchanged by the failed write
    let conn = SqliteConnection::open(&db.path).await.unwrap();
    let rows = conn.query("SELECT COUNT(*) AS n FROM events", &[]).await.unwrap();
    assert_eq!(rows[0].get_by_name("n").unwrap().as_i64(), Some(1));
    conn.close().await.unwrap();

    // the connection was released; the store still works
    store.write_event(&v2_event("second")).await.unwrap();
}

#[tokio::test]
async fn arity_mismatch_is_an_execution_error() {
    let db = setup_db().await;

    // events table has 4 columns; a script tuple has 25
    let store = TelemetryStore::new(
        StoreConfig::new(Backend::Sqlite, db.path.clone()).with_script_table("events"),
    )
    .unwrap();

    let err = store.write_script(&v2_script()).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Execution);
}

#[tokio::test]
async fn unknown_schema_fails_before_connecting() {
    // DSN points nowhere; a query-build failure must not touch it
    let store = TelemetryStore::new(StoreConfig::new(
        Backend::Sqlite,
        "sqlite:/nonexistent/dir/usage.db",
    ))
    .unwrap();

    let mut rec = v2_script();
    rec.meta.schema_version = SchemaVersion::Other("9.9".into());
    let err = store.write_script(&rec).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::QueryBuild);
}

#[tokio::test]
async fn connection_failure_is_retriable() {
    let store = TelemetryStore::new(StoreConfig::new(
        Backend::Sqlite,
        "sqlite:/nonexistent/dir/usage.db",
    ))
    .unwrap();

    let err = store.write_event(&v2_event("x")).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Connection);
    assert!(err.is_retriable());
}
