//! Integration tests for the hlog binary.
//!
//! These tests verify end-to-end behavior including:
//! - Logging and clearing metrics through the inline edit flow
//! - Day display and trend charts
//! - Targets, export and compaction
//! - Refusing to run without a signed-in user

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the CLI binary with an isolated config and data directory
fn cli(dir: &Path) -> Command {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        fs::write(&config_path, "").expect("Failed to write config");
    }
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hlog"));
    cmd.env_remove("HLOG_USER")
        .arg("--config")
        .arg(&config_path)
        .arg("--data-dir")
        .arg(dir.join("data"));
    cmd
}

fn log(dir: &Path, field: &str, value: &str, date: &str) {
    cli(dir)
        .args(["--user", "ann", "log", field, value, "--date", date])
        .assert()
        .success();
}

fn saved_records(dir: &Path) -> Vec<serde_json::Value> {
    let contents = fs::read_to_string(dir.join("data/entries.jsonl")).expect("Failed to read log");
    contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("Invalid JSON line"))
        .collect()
}

#[test]
fn test_cli_help() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Daily health metric log"));
}

#[test]
fn test_grouped_input_is_saved_as_number() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["--user", "ann", "log", "steps", "1,234", "--date", "2026-05-20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1,234 steps"));

    let records = saved_records(temp_dir.path());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["key"], "2026-05-20_ann");
    assert_eq!(records[0]["entry"]["steps"], 1234);
}

#[test]
fn test_clear_keeps_other_fields() {
    let temp_dir = setup_test_dir();
    log(temp_dir.path(), "steps", "8000", "2026-05-20");
    log(temp_dir.path(), "weight", "182.5 lbs", "2026-05-20");

    cli(temp_dir.path())
        .args(["--user", "ann", "clear", "weight", "--date", "2026-05-20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared Weight"));

    let records = saved_records(temp_dir.path());
    let last = records.last().unwrap();
    assert!(last["entry"]["weight"].is_null());
    assert_eq!(last["entry"]["steps"], 8000);

    // Every write addressed the same record
    assert!(records.iter().all(|r| r["id"] == records[0]["id"]));
}

#[test]
fn test_unchanged_value_is_not_saved() {
    let temp_dir = setup_test_dir();
    log(temp_dir.path(), "calories", "2200", "2026-05-20");

    cli(temp_dir.path())
        .args(["--user", "ann", "log", "calories", "2,200 kcal", "--date", "2026-05-20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No change"));

    assert_eq!(saved_records(temp_dir.path()).len(), 1);
}

#[test]
fn test_show_displays_day_and_previous_weight() {
    let temp_dir = setup_test_dir();
    log(temp_dir.path(), "weight", "183", "2026-05-19");
    log(temp_dir.path(), "steps", "12000", "2026-05-20");

    cli(temp_dir.path())
        .args(["--user", "ann", "show", "--date", "2026-05-20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("12,000 steps"))
        .stdout(predicate::str::contains("/ 10,000"))
        .stdout(predicate::str::contains("(prev 183 lbs)"));
}

#[test]
fn test_trends_week_chart() {
    let temp_dir = setup_test_dir();
    log(temp_dir.path(), "steps", "8000", "2026-05-18");
    log(temp_dir.path(), "steps", "12000", "2026-05-19");

    cli(temp_dir.path())
        .args([
            "--user", "ann", "trends", "--field", "steps", "--range", "week", "--today",
            "2026-05-20",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("8,000 steps"))
        .stdout(predicate::str::contains("12,000 steps"))
        .stdout(predicate::str::contains("goal: 10,000 steps"));
}

#[test]
fn test_trends_for_past_day_with_long_newer_history() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();

    // 500 consecutive days of steps starting 2025-01-01
    let start = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let mut lines = String::new();
    for i in 0..500u32 {
        let date = start + chrono::Duration::days(i64::from(i));
        let record = serde_json::json!({
            "id": format!("00000000-0000-4000-8000-{:012}", i),
            "key": format!("{}_ann", date),
            "revision": i + 1,
            "entry": { "date": date.to_string(), "steps": 1000 + i, "is_manual": true },
        });
        lines.push_str(&record.to_string());
        lines.push('\n');
    }
    fs::write(data_dir.join("entries.jsonl"), lines).unwrap();

    cli(temp_dir.path())
        .args([
            "--user", "ann", "trends", "--field", "steps", "--range", "week", "--today",
            "2025-03-01",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("1,059 steps"))
        .stdout(predicate::str::contains("1,053 steps"))
        .stdout(predicate::str::contains("No data").not());
}

#[test]
fn test_trends_without_data() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["--user", "ann", "trends", "--field", "weight", "--range", "year"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No data for this range yet."))
        .stdout(predicate::str::contains("Weight: last year"))
        .stdout(predicate::str::contains("—").not());
}

#[test]
fn test_targets_set_and_show() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["--user", "ann", "targets", "set", "--steps", "12000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("12,000 steps"));

    cli(temp_dir.path())
        .args(["--user", "ann", "targets", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("12,000 steps"))
        .stdout(predicate::str::contains("1,800 kcal"));

    // Other users keep the defaults
    cli(temp_dir.path())
        .args(["--user", "bob", "targets"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10,000 steps"));
}

#[test]
fn test_export_and_compact() {
    let temp_dir = setup_test_dir();
    log(temp_dir.path(), "steps", "100", "2026-05-19");
    log(temp_dir.path(), "steps", "200", "2026-05-19");
    log(temp_dir.path(), "steps", "300", "2026-05-20");

    cli(temp_dir.path())
        .args(["--user", "ann", "compact"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 records"));
    assert_eq!(saved_records(temp_dir.path()).len(), 2);

    let csv_path = temp_dir.path().join("export.csv");
    cli(temp_dir.path())
        .args(["--user", "ann", "export", "--output"])
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 days"));

    let csv = fs::read_to_string(&csv_path).unwrap();
    assert!(csv.starts_with("date,steps"));
    assert!(csv.contains("2026-05-19,200"));
}

#[test]
fn test_user_from_config_file() {
    let temp_dir = setup_test_dir();
    fs::write(temp_dir.path().join("config.toml"), "[user]\nid = \"cat\"\n").unwrap();

    cli(temp_dir.path())
        .args(["log", "protein", "150", "--date", "2026-05-20"])
        .assert()
        .success();

    let records = saved_records(temp_dir.path());
    assert_eq!(records[0]["key"], "2026-05-20_cat");
}

#[test]
fn test_not_signed_in_fails_without_touching_store() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["log", "steps", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));

    assert!(!temp_dir.path().join("data/entries.jsonl").exists());
}

#[test]
fn test_unknown_field_rejected() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["--user", "ann", "log", "mood", "5"])
        .assert()
        .failure();
}
