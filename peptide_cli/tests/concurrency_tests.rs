//! Concurrency tests for ptrack.
//!
//! These tests verify that multiple processes can safely:
//! - Append to the dose log simultaneously (file locking)
//! - Add cycles simultaneously without losing any
//! - Read the schedule while others write

use assert_cmd::Command;
use std::path::Path;
use std::thread;
use std::time::Duration;
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

/// Ten days of once-daily doses; returns the cycle id
fn setup_cycle(data_dir: &Path) -> String {
    let output = ptrack(data_dir)
        .args(["cycle", "add", "--substance", "GHK-Cu", "--dose", "1 mg"])
        .args(["--frequency", "daily", "--start", "2024-01-01", "--end", "2024-01-10"])
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
fn test_sequential_logging() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = setup_cycle(&data_dir);

    for day in 1..=5 {
        thread::sleep(Duration::from_millis(day * 5));
        ptrack(&data_dir)
            .args(["log", format!("{}:2024-01-{:02}:0800", cycle_id, day).as_str()])
            .assert()
            .success();
    }

    let wal = std::fs::read_to_string(data_dir.join("doses.wal")).expect("Failed to read log");
    assert_eq!(wal.lines().count(), 5, "Expected 5 records");

    ptrack(&data_dir)
        .args(["progress", "--today", "2024-01-05"])
        .assert()
        .success()
        .stdout(predicates::str::contains("5/14 doses"));
}

#[test]
fn test_no_dose_log_corruption_under_load() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = setup_cycle(&data_dir);

    // One process per dose, all at once
    let handles: Vec<_> = (1..=10u64)
        .map(|day| {
            let data_dir = data_dir.clone();
            let dose_id = format!("{}:2024-01-{:02}:0800", cycle_id, day);
            thread::spawn(move || {
                // Small stagger to reduce thundering herd
                thread::sleep(Duration::from_millis(day * 3));
                ptrack(&data_dir)
                    .args(["log", dose_id.as_str()])
                    .timeout(Duration::from_secs(10))
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    // Every line must be a complete JSON record
    let wal = std::fs::read_to_string(data_dir.join("doses.wal")).expect("Failed to read log");
    let mut valid_count = 0;
    for line in wal.lines() {
        if line.is_empty() {
            continue;
        }
        let parsed: Result<serde_json::Value, _> = serde_json::from_str(line);
        assert!(parsed.is_ok(), "Dose log contains invalid JSON line: {}", line);
        valid_count += 1;
    }
    assert_eq!(valid_count, 10, "Expected 10 valid records");

    ptrack(&data_dir)
        .args(["progress", "--from-doses", "--today", "2024-01-10"])
        .assert()
        .success()
        .stdout(predicates::str::contains("10/10 doses"));

    // Counter updates are serialized too
    ptrack(&data_dir)
        .args(["progress", "--today", "2024-01-10"])
        .assert()
        .success()
        .stdout(predicates::str::contains("10/14 doses"));
}

#[test]
fn test_concurrent_cycle_adds() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                ptrack(&data_dir)
                    .args(["cycle", "add", "--substance", format!("Peptide {}", i).as_str()])
                    .args(["--dose", "1 mg", "--frequency", "daily"])
                    .args(["--start", "2024-01-01", "--end", "2024-01-10"])
                    .timeout(Duration::from_secs(10))
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let cycles = std::fs::read_to_string(data_dir.join("cycles.json")).expect("Failed to read cycles");
    let parsed: Vec<serde_json::Value> = serde_json::from_str(&cycles).expect("Invalid cycles.json");
    assert_eq!(parsed.len(), 8, "Every concurrently added cycle must be stored");
}

#[test]
fn test_reads_during_writes() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let cycle_id = setup_cycle(&data_dir);

    let writer_dir = data_dir.clone();
    let writer = thread::spawn(move || {
        for day in 1..=5 {
            ptrack(&writer_dir)
                .args(["log", format!("{}:2024-01-{:02}:0800", cycle_id, day).as_str()])
                .assert()
                .success();
        }
    });

    for _ in 0..5 {
        ptrack(&data_dir)
            .args(["doses", "--from", "2024-01-01", "--to", "2024-01-10"])
            .timeout(Duration::from_secs(10))
            .assert()
            .success();
        thread::sleep(Duration::from_millis(5));
    }

    writer.join().expect("Writer thread panicked");

    let cycles = std::fs::read_to_string(data_dir.join("cycles.json")).expect("Failed to read cycles");
    let parsed: Result<serde_json::Value, _> = serde_json::from_str(&cycles);
    assert!(parsed.is_ok(), "cycles.json contains invalid JSON");
}
