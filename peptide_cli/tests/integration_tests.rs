//! Integration tests for the ptrack binary.
//!
//! These tests verify end-to-end behavior including:
//! - Cycle creation and lifecycle commands
//! - Dose listing and log/skip/delete
//! - Calendar and progress output
//! - Protocol templates and config handling

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// CLI bound to a data directory, isolated from the user's own config
fn ptrack(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ptrack"));
    cmd.arg("--data-dir")
        .arg(data_dir)
        .env("XDG_CONFIG_HOME", data_dir.join("config"))
        .env_remove("RUST_LOG");
    cmd
}

/// Add a BPC-157 cycle and return its id
fn add_cycle(data_dir: &Path, frequency: &str, start: &str, end: &str) -> String {
    let output = ptrack(data_dir)
        .args(["cycle", "add", "--substance", "BPC-157", "--dose", "250 mcg"])
        .args(["--frequency", frequency, "--start", start, "--end", end])
        .output()
        .expect("Failed to run ptrack");
    assert!(
        output.status.success(),
        "cycle add failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("✓ Added cycle "))
        .expect("No cycle id in output")
        .trim()
        .to_string()
}

#[test]
fn test_cli_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("ptrack"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Peptide cycle tracker"));
}

#[test]
fn test_add_cycle_creates_files() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    add_cycle(&data_dir, "daily", "2024-01-01", "2024-01-08");

    assert!(data_dir.join("cycles.json").exists());

    ptrack(&data_dir)
        .args(["cycle", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BPC-157"))
        .stdout(predicate::str::contains("Once daily"))
        .stdout(predicate::str::contains("0/7"));
}

#[test]
fn test_end_before_start_rejected() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    ptrack(&data_dir)
        .args(["cycle", "add", "--substance", "BPC-157", "--dose", "250 mcg"])
        .args(["--frequency", "daily", "--start", "2024-02-01", "--end", "2024-01-01"])
        .assert()
        .failure();

    assert!(!data_dir.join("cycles.json").exists());
}

#[test]
fn test_bad_frequency_rejected() {
    let temp_dir = setup_test_dir();

    ptrack(temp_dir.path())
        .args(["cycle", "add", "--substance", "BPC-157", "--dose", "250 mcg"])
        .args(["--frequency", "hourly", "--start", "2024-01-01", "--end", "2024-01-08"])
        .assert()
        .failure();
}

#[test]
fn test_weekly_count_falls_back_to_default_days() {
    let temp_dir = setup_test_dir();

    ptrack(temp_dir.path())
        .args(["cycle", "add", "--substance", "TB-500", "--dose", "2.5 mg"])
        .args(["--frequency", "weekly:3", "--start", "2024-01-01", "--end", "2024-01-07"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mon, Wed, Fri"));

    // Jan 1 2024 is a Monday
    ptrack(temp_dir.path())
        .args(["doses", "--from", "2024-01-01", "--to", "2024-01-07"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-01-01 08:00"))
        .stdout(predicate::str::contains("2024-01-03 08:00"))
        .stdout(predicate::str::contains("2024-01-05 08:00"))
        .stdout(predicate::str::contains("2024-01-02").not());
}

#[test]
fn test_doses_listing() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = add_cycle(&data_dir, "daily:2", "2024-01-01", "2024-01-03");

    let output = ptrack(&data_dir)
        .args(["doses", "--from", "2024-01-01", "--to", "2024-01-03"])
        .args(["--today", "2024-01-01"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 6);
    assert!(lines[0].starts_with("2024-01-01 08:00"));
    assert!(lines[1].starts_with("2024-01-01 20:00"));
    assert!(lines[0].contains("subcutaneous"));
    assert!(lines[0].ends_with(&format!("{}:2024-01-01:0800", cycle_id)));
    assert!(lines.iter().all(|l| l.contains("scheduled")));
}

#[test]
fn test_doses_outside_cycle_range() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    add_cycle(&data_dir, "daily", "2024-01-01", "2024-01-03");

    ptrack(&data_dir)
        .args(["doses", "--from", "2024-03-01", "--to", "2024-03-31"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No doses"));
}

#[test]
fn test_log_dose_workflow() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = add_cycle(&data_dir, "daily", "2024-01-01", "2024-01-08");
    let dose_id = format!("{}:2024-01-02:0800", cycle_id);

    ptrack(&data_dir)
        .args(["log", dose_id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Logged"));

    // Second log is a no-op
    ptrack(&data_dir)
        .args(["log", dose_id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("already"));

    ptrack(&data_dir)
        .args(["doses", "--from", "2024-01-02", "--to", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("logged"));

    ptrack(&data_dir)
        .args(["cycle", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1/7"));

    // One line in the dose log despite two log calls
    let wal = fs::read_to_string(data_dir.join("doses.wal")).unwrap();
    assert_eq!(wal.lines().count(), 1);
}

#[test]
fn test_skip_marks_missed() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = add_cycle(&data_dir, "daily", "2024-01-01", "2024-01-08");
    let dose_id = format!("{}:2024-01-04:0800", cycle_id);

    ptrack(&data_dir).args(["skip", dose_id.as_str()]).assert().success();

    ptrack(&data_dir)
        .args(["doses", "--from", "2024-01-04", "--to", "2024-01-04"])
        .assert()
        .success()
        .stdout(predicate::str::contains("missed"));
}

#[test]
fn test_deleted_dose_stays_deleted() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = add_cycle(&data_dir, "daily", "2024-01-01", "2024-01-08");
    let dose_id = format!("{}:2024-01-05:0800", cycle_id);

    ptrack(&data_dir).args(["delete", dose_id.as_str()]).assert().success();

    // Wider range still does not resurrect it
    ptrack(&data_dir)
        .args(["doses", "--from", "2023-12-01", "--to", "2024-02-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains(dose_id.as_str()).not())
        .stdout(predicate::str::contains("2024-01-04 08:00"))
        .stdout(predicate::str::contains("2024-01-06 08:00"));

    ptrack(&data_dir).args(["log", dose_id.as_str()]).assert().failure();
}

#[test]
fn test_invalid_dose_ids_rejected() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = add_cycle(&data_dir, "daily", "2024-01-01", "2024-01-08");

    ptrack(&data_dir).args(["log", "not-a-dose"]).assert().failure();

    // Valid shape, but no such slot
    let wrong_slot = format!("{}:2024-01-02:2000", cycle_id);
    ptrack(&data_dir).args(["log", wrong_slot.as_str()]).assert().failure();

    // Unknown cycle
    ptrack(&data_dir)
        .args(["log", "00000000-0000-0000-0000-000000000000:2024-01-02:0800"])
        .assert()
        .failure();
}

#[test]
fn test_calendar_grid() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    add_cycle(&data_dir, "weekly:mon", "2024-01-01", "2024-02-29");

    let output = ptrack(&data_dir)
        .args(["calendar", "--year", "2024", "--month", "1", "--today", "2024-01-10"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "January 2024");
    assert!(lines[1].starts_with("Mon"));

    // Six week rows, each starting with a Monday carrying one dose
    let rows = &lines[2..8];
    assert_eq!(rows.len(), 6);
    assert!(rows[0].starts_with(" 1 1"));
    assert!(rows[1].starts_with(" 8 1"));
    assert!(rows[1].contains("10* "));
    assert!(rows[5].starts_with(" 5.1"));
}

#[test]
fn test_invalid_month_is_an_error() {
    let temp_dir = setup_test_dir();

    ptrack(temp_dir.path())
        .args(["calendar", "--year", "2024", "--month", "13"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("2024-13"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_progress_output() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = add_cycle(&data_dir, "daily", "2024-01-01", "2024-01-08");

    ptrack(&data_dir)
        .args(["log", format!("{}:2024-01-01:0800", cycle_id).as_str()])
        .assert()
        .success();

    ptrack(&data_dir)
        .args(["progress", "--today", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("14.3%"))
        .stdout(predicate::str::contains("1/7 doses"))
        .stdout(predicate::str::contains("week 1/1"))
        .stdout(predicate::str::contains("█░░░░░░░░░"));

    // Recounted from history: 8 dated doses, both ends inclusive
    ptrack(&data_dir)
        .args(["progress", "--from-doses", "--today", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1/8 doses"));
}

#[test]
fn test_cycle_lifecycle_by_short_id() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = add_cycle(&data_dir, "daily", "2024-01-01", "2024-01-31");
    let short = &cycle_id[..8];

    ptrack(&data_dir)
        .args(["cycle", "pause", short])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Paused BPC-157"));

    // Paused: nothing from today on
    ptrack(&data_dir)
        .args(["doses", "--from", "2024-01-10", "--to", "2024-01-12", "--today", "2024-01-11"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-01-10 08:00"))
        .stdout(predicate::str::contains("2024-01-11").not());

    ptrack(&data_dir).args(["cycle", "resume", short]).assert().success();
    ptrack(&data_dir)
        .args(["doses", "--from", "2024-01-11", "--to", "2024-01-11", "--today", "2024-01-11"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-01-11 08:00"));

    ptrack(&data_dir).args(["cycle", "complete", short]).assert().success();
    ptrack(&data_dir).args(["cycle", "pause", short]).assert().failure();
    ptrack(&data_dir)
        .args(["cycle", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));
}

#[test]
fn test_edit_cycle_refreshes_expected() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = add_cycle(&data_dir, "daily", "2024-01-01", "2024-01-15");

    ptrack(&data_dir)
        .args(["cycle", "edit", cycle_id.as_str(), "--frequency", "daily:2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Twice daily"))
        .stdout(predicate::str::contains("0/28"));
}

#[test]
fn test_protocols() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    ptrack(&data_dir)
        .args(["protocol", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("healing_stack"))
        .stdout(predicate::str::contains("TB-500"));

    ptrack(&data_dir)
        .args(["protocol", "apply", "healing_stack", "--start", "2024-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 cycles"));

    ptrack(&data_dir)
        .args(["cycle", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BPC-157"))
        .stdout(predicate::str::contains("TB-500"));

    ptrack(&data_dir)
        .args(["protocol", "apply", "nope", "--start", "2024-01-01"])
        .assert()
        .failure();
}

#[test]
fn test_clear_requires_confirmation() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    add_cycle(&data_dir, "daily", "2024-01-01", "2024-01-08");

    ptrack(&data_dir).arg("clear").assert().failure();
    ptrack(&data_dir)
        .args(["cycle", "list"])
        .assert()
        .stdout(predicate::str::contains("BPC-157"));

    ptrack(&data_dir).args(["clear", "--yes"]).assert().success();
    ptrack(&data_dir)
        .args(["cycle", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cycles yet."));
}

#[test]
fn test_config_mark_missed_policy() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = add_cycle(&data_dir, "daily", "2024-01-01", "2024-01-03");

    let config_path = data_dir.join("custom.toml");
    fs::write(
        &config_path,
        "[schedule]\npast_due = \"mark_missed\"\ndefault_route = \"intramuscular\"\n",
    )
    .unwrap();

    let output = ptrack(&data_dir)
        .arg("--config")
        .arg(&config_path)
        .args(["doses", "--from", "2024-01-01", "--to", "2024-01-03", "--today", "2024-01-02"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("missed"));
    assert!(lines[1].contains("scheduled"));
    assert!(lines[2].contains("scheduled"));
    assert!(lines.iter().all(|l| l.contains("intramuscular")));

    // Reset puts the past-due dose back to scheduled
    ptrack(&data_dir)
        .arg("--config")
        .arg(&config_path)
        .args(["reset", format!("{}:2024-01-01:0800", cycle_id).as_str()])
        .args(["--today", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Reset"));

    ptrack(&data_dir)
        .arg("--config")
        .arg(&config_path)
        .args(["doses", "--from", "2024-01-01", "--to", "2024-01-01", "--today", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scheduled"));
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(&config_path, "[progress]\nsegments = 0\n").unwrap();

    ptrack(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .args(["cycle", "list"])
        .assert()
        .failure();
}

#[test]
fn test_compact_folds_dose_log() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = add_cycle(&data_dir, "daily", "2024-01-01", "2024-01-08");
    let dose_id = format!("{}:2024-01-02:0800", cycle_id);

    ptrack(&data_dir).args(["log", dose_id.as_str()]).assert().success();
    ptrack(&data_dir).args(["skip", dose_id.as_str()]).assert().success();

    ptrack(&data_dir)
        .arg("compact")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 → 1"));

    ptrack(&data_dir)
        .args(["doses", "--from", "2024-01-02", "--to", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("missed"));
}
