//! CLI command contract tests
//!
//! Subprocess-style tests against a temp data directory with fixture
//! snapshot files. Guarantees tested:
//! - Deterministic exit codes
//! - Stable JSON output for `session show --json`
//! - Actionable error messages for failure paths

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Create a temp workspace with a hostdesk.toml pointing data_dir at it.
/// Returns (TempDir guard, config file path string).
fn setup_workspace() -> (TempDir, String) {
    let dir = TempDir::new().expect("create temp dir");
    let config_path = dir.path().join("hostdesk.toml");
    let config = format!(
        "[general]\ndata_dir = \"{}\"\n",
        dir.path().display()
    );
    std::fs::write(&config_path, config).expect("write config");
    (dir, config_path.to_string_lossy().to_string())
}

/// Build a hostdesk command configured for the given workspace.
fn hostdesk_cmd_for(config: &str) -> Command {
    let mut cmd = Command::cargo_bin("hostdesk").expect("hostdesk binary should be built");
    cmd.env("HOSTDESK_CONFIG", config);
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_ticket_snapshot(dir: &TempDir, name: &str, body: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, body).expect("write snapshot");
    path.to_string_lossy().to_string()
}

#[test]
fn contract_help_lists_subcommands() {
    Command::cargo_bin("hostdesk")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("session"));
}

#[test]
fn contract_watch_without_snapshots_fails_actionably() {
    let (_dir, config) = setup_workspace();
    hostdesk_cmd_for(&config)
        .args(["watch", "--once"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no snapshot files configured"));
}

#[test]
fn contract_watch_once_exits_cleanly() {
    let (dir, config) = setup_workspace();
    let tickets = write_ticket_snapshot(
        &dir,
        "tickets.json",
        r#"{"entities": [{"id": "t-1", "subject": "wifi down", "kind": "guest"}]}"#,
    );

    hostdesk_cmd_for(&config)
        .args(["watch", "--once", "--tickets", &tickets])
        .assert()
        .success();

    // The session document was persisted to the data directory.
    assert!(dir.path().join("session.json").exists());
}

#[test]
fn contract_session_show_is_read_only() {
    let (dir, config) = setup_workspace();
    hostdesk_cmd_for(&config)
        .args(["session", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no active session"));
    // Inspecting must not materialize a session document.
    assert!(!dir.path().join("session.json").exists());
}

#[test]
fn contract_session_reset_then_show_json() {
    let (_dir, config) = setup_workspace();

    hostdesk_cmd_for(&config)
        .args(["session", "reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("session reset"));

    let output = hostdesk_cmd_for(&config)
        .args(["session", "show", "--json"])
        .output()
        .expect("run session show");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    let doc: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert!(doc.get("started_at").is_some());
    assert!(doc.get("seen").is_some());
    assert!(doc.get("watermark").is_some());
}

#[test]
fn contract_session_clear_removes_document() {
    let (dir, config) = setup_workspace();

    hostdesk_cmd_for(&config)
        .args(["session", "reset"])
        .assert()
        .success();
    assert!(dir.path().join("session.json").exists());

    hostdesk_cmd_for(&config)
        .args(["session", "clear"])
        .assert()
        .success();
    assert!(!dir.path().join("session.json").exists());
    assert!(!dir.path().join("session.lock").exists());

    // Show after clear reports the absence instead of recreating.
    hostdesk_cmd_for(&config)
        .args(["session", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no active session"));
}

#[test]
fn contract_watch_once_marks_baseline_and_redelivery_is_quiet() {
    let (dir, config) = setup_workspace();
    let tickets = write_ticket_snapshot(
        &dir,
        "tickets.json",
        r#"{"entities": [{"id": "t-1", "subject": "wifi down", "kind": "guest"}]}"#,
    );

    // First run establishes the baseline and persists the seen-set.
    hostdesk_cmd_for(&config)
        .args(["watch", "--once", "--tickets", &tickets])
        .assert()
        .success();

    let session =
        std::fs::read_to_string(dir.path().join("session.json")).expect("session document");
    assert!(session.contains("t-1"));

    // Second process sees the same snapshot; nothing new to notify.
    hostdesk_cmd_for(&config)
        .args(["watch", "--once", "--tickets", &tickets])
        .assert()
        .success();
}
