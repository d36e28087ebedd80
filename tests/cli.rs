//! CLI contract tests.
//!
//! Runs the binary against temp source databases and checkpoint files and
//! checks exit codes and JSON output. No search cluster is needed: sink
//! writes go to the in-memory sink via `--dry-run`, and unreachable-sink
//! behavior is checked against a closed port.

use assert_cmd::Command;
use rusqlite::Connection;
use serde_json::Value;
use tempfile::TempDir;

const ENV_VARS: [&str; 8] = [
    "FILMSYNC_CONFIG",
    "FILMSYNC_SOURCE_DB",
    "ELASTIC_URL",
    "ELASTIC_INDEX_NAME",
    "DATA_BATCH_SIZE",
    "FILMSYNC_STATE_PATH",
    "FILMSYNC_POLL_INTERVAL",
    "RUST_LOG",
];

/// Command with a clean environment pointing at `dir`.
fn filmsync(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("filmsync").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("FILMSYNC_SOURCE_DB", dir.path().join("catalog.db"))
        .env("FILMSYNC_STATE_PATH", dir.path().join("state.json"))
        .args(["--json", "--quiet"]);
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

/// Temp dir with an initialized, populated catalog.
fn populated() -> TempDir {
    let dir = TempDir::new().unwrap();
    filmsync(&dir).args(["source", "init"]).assert().success();

    let conn = Connection::open(dir.path().join("catalog.db")).unwrap();
    conn.execute_batch(
        "INSERT INTO film_work (id, title, rating, type, modified) VALUES
            ('f1', 'Alpha', 7.5, 'movie', '2024-01-01T00:00:00Z'),
            ('f2', 'Beta', NULL, 'movie', '2024-01-02T00:00:00Z');
         INSERT INTO person (id, full_name, modified) VALUES
            ('p1', 'Jane Roe', '2024-01-01T00:00:00Z');
         INSERT INTO person_film_work (id, film_work_id, person_id, role) VALUES
            ('pf1', 'f1', 'p1', 'actor');",
    )
    .unwrap();
    dir
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    let output = filmsync(&dir).arg("version").output().unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_index_schema_prints_strict_mapping() {
    let dir = TempDir::new().unwrap();
    let output = filmsync(&dir).args(["index", "schema"]).output().unwrap();
    assert!(output.status.success());

    let body = stdout_json(&output);
    assert_eq!(body["mappings"]["dynamic"], "strict");
    assert!(body["settings"]["analysis"]["analyzer"]["ru_en"].is_object());
}

#[test]
fn test_source_init_creates_relations() {
    let dir = TempDir::new().unwrap();
    let output = filmsync(&dir).args(["source", "init"]).output().unwrap();
    assert!(output.status.success());

    let conn = Connection::open(dir.path().join("catalog.db")).unwrap();
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
             AND name IN ('film_work', 'person', 'genre', 'person_film_work', 'genre_film_work')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 5);
}

#[test]
fn test_checkpoint_show_without_state() {
    let dir = TempDir::new().unwrap();
    let output = filmsync(&dir).args(["checkpoint", "show"]).output().unwrap();
    assert!(output.status.success());

    let body = stdout_json(&output);
    assert!(body["checkpoints"]["film_work"].is_null());
    assert!(body["checkpoints"]["person"].is_null());
    assert!(body["checkpoints"]["genre"].is_null());
}

#[test]
fn test_checkpoint_reset() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("state.json"),
        r#"{"person": "2024-01-01T00:00:00Z", "genre": "2024-01-01T00:00:00Z"}"#,
    )
    .unwrap();

    let output = filmsync(&dir)
        .args(["checkpoint", "reset", "people"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["reset"][0], "person");

    let output = filmsync(&dir).args(["checkpoint", "show"]).output().unwrap();
    let body = stdout_json(&output);
    assert!(body["checkpoints"]["person"].is_null());
    assert!(body["checkpoints"]["genre"].is_string());
}

#[test]
fn test_checkpoint_reset_unknown_stream_suggests() {
    let dir = TempDir::new().unwrap();
    let output = filmsync(&dir)
        .args(["checkpoint", "reset", "persn"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));

    let err: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["error"]["code"], "INVALID_ARGUMENT");
    assert!(err["error"]["message"].as_str().unwrap().contains("person"));
}

#[test]
fn test_corrupt_checkpoint_file_exits_with_checkpoint_code() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("state.json"), "not json").unwrap();

    let output = filmsync(&dir).args(["checkpoint", "show"]).output().unwrap();
    assert_eq!(output.status.code(), Some(6));
}

#[test]
fn test_invalid_batch_size_is_config_error() {
    let dir = populated();
    let output = filmsync(&dir)
        .args(["run", "--dry-run", "--batch-size", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn test_missing_source_is_config_error() {
    let dir = TempDir::new().unwrap();
    let output = filmsync(&dir).args(["run", "--once"]).output().unwrap();
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn test_dry_run_indexes_without_moving_checkpoints() {
    let dir = populated();
    let output = filmsync(&dir)
        .args(["run", "--dry-run"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let body = stdout_json(&output);
    assert_eq!(body["dry_run"], true);
    assert_eq!(body["streams"]["film_work"]["documents"], 2);
    assert_eq!(body["streams"]["person"]["affected_roots"], 1);
    assert_eq!(body["streams"]["genre"]["extracted"], 0);

    assert!(!dir.path().join("state.json").exists());
}

#[test]
fn test_unreachable_sink_exits_with_sink_code() {
    let dir = populated();
    let config = dir.path().join("filmsync.json");
    std::fs::write(
        &config,
        r#"{"request_timeout_secs": 2, "backoff": {"initial": 0, "max": 0, "max_attempts": 1}}"#,
    )
    .unwrap();

    let output = filmsync(&dir)
        .arg("--config")
        .arg(&config)
        .args(["run", "--once", "--elastic-url", "http://127.0.0.1:9"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));

    let err: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["error"]["code"], "SINK_UNAVAILABLE");
    assert_eq!(err["error"]["transient"], true);
}
