//! Corruption recovery tests for ptrack.
//!
//! These tests verify the system can handle:
//! - Corrupted dose log lines
//! - Partial writes
//! - Corrupted or empty cycle files
//! - Missing files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use std::path::Path;
use tempfile::TempDir;

fn ptrack(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ptrack"));
    cmd.arg("--data-dir")
        .arg(data_dir)
        .env("XDG_CONFIG_HOME", data_dir.join("config"))
        .env_remove("RUST_LOG");
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn add_cycle(data_dir: &Path) -> String {
    let output = ptrack(data_dir)
        .args(["cycle", "add", "--substance", "BPC-157", "--dose", "250 mcg"])
        .args(["--frequency", "daily", "--start", "2024-01-01", "--end", "2024-01-08"])
        .output()
        .expect("Failed to run ptrack");
    assert!(output.status.success());

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .find_map(|line| line.strip_prefix("✓ Added cycle "))
        .expect("No cycle id in output")
        .trim()
        .to_string()
}

#[test]
fn test_corrupted_dose_log_lines_ignored() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = add_cycle(&data_dir);

    fs::write(
        data_dir.join("doses.wal"),
        "{ invalid json }\n{ more invalid }\n",
    )
    .expect("Failed to write corrupted log");

    // Schedule still renders, every dose scheduled
    ptrack(&data_dir)
        .args(["doses", "--from", "2024-01-01", "--to", "2024-01-08", "--today", "2024-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scheduled"));

    // Appends still work after the garbage
    ptrack(&data_dir)
        .args(["log", format!("{}:2024-01-02:0800", cycle_id).as_str()])
        .assert()
        .success();

    ptrack(&data_dir)
        .args(["doses", "--from", "2024-01-02", "--to", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("logged"));
}

#[test]
fn test_partial_dose_log_line() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = add_cycle(&data_dir);

    ptrack(&data_dir)
        .args(["skip", format!("{}:2024-01-03:0800", cycle_id).as_str()])
        .assert()
        .success();

    // Simulate a crash mid-append: no trailing newline
    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(data_dir.join("doses.wal"))
        .unwrap();
    write!(file, r#"{{"id":"partial"#).unwrap();
    drop(file);

    ptrack(&data_dir)
        .args(["doses", "--from", "2024-01-03", "--to", "2024-01-03"])
        .assert()
        .success()
        .stdout(predicate::str::contains("missed"));
}

#[test]
fn test_corrupted_cycles_file_is_reported_not_replaced() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let cycles_path = data_dir.join("cycles.json");
    fs::write(&cycles_path, "[{ not valid json").expect("Failed to write corrupted cycles");

    ptrack(&data_dir).args(["cycle", "list"]).assert().failure();

    // Adding must not overwrite the unreadable file
    ptrack(&data_dir)
        .args(["cycle", "add", "--substance", "BPC-157", "--dose", "250 mcg"])
        .args(["--frequency", "daily", "--start", "2024-01-01", "--end", "2024-01-08"])
        .assert()
        .failure();

    let contents = fs::read_to_string(&cycles_path).unwrap();
    assert_eq!(contents, "[{ not valid json");
}

#[test]
fn test_empty_files() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    fs::write(data_dir.join("cycles.json"), "").unwrap();
    fs::write(data_dir.join("doses.wal"), "").unwrap();

    ptrack(&data_dir)
        .args(["cycle", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cycles yet."));
}

#[test]
fn test_missing_data_dir() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("does/not/exist");

    ptrack(&data_dir)
        .args(["progress"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cycles yet."));

    // First write creates it
    add_cycle(&data_dir);
    assert!(data_dir.join("cycles.json").exists());
}

#[test]
fn test_records_for_unknown_cycles_are_ignored() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    add_cycle(&data_dir);

    // A record left behind by a cycle that no longer exists
    let orphan = serde_json::json!({
        "id": "00000000-0000-0000-0000-000000000001:2024-01-02:0800",
        "cycle_id": "00000000-0000-0000-0000-000000000001",
        "date": "2024-01-02",
        "time": "08:00:00",
        "status": "logged",
        "updated_at": "2024-01-02T08:00:00Z"
    });
    fs::write(data_dir.join("doses.wal"), format!("{}\n", orphan)).unwrap();

    let output = ptrack(&data_dir)
        .args(["doses", "--from", "2024-01-02", "--to", "2024-01-02", "--today", "2024-01-01"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.contains("scheduled"));
    assert!(!stdout.contains("00000000-0000-0000-0000-000000000001"));
}
