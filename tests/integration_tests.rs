//! Integration tests for the drainpool CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn drainpool(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("drainpool").unwrap();
    // Keep user and project config files out of the picture
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

/// Test CLI binary exists and responds to --help
#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    drainpool(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

/// Test CLI responds to --version
#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    drainpool(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("drainpool"));
}

/// Test invalid subcommand shows error
#[test]
fn test_invalid_subcommand() {
    let dir = TempDir::new().unwrap();
    drainpool(&dir)
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_run_reports_json_summary() {
    let dir = TempDir::new().unwrap();
    let output = drainpool(&dir)
        .args([
            "run",
            "--items",
            "40",
            "--workers",
            "6",
            "--delay-ms",
            "0",
            "--progress",
            "silent",
            "--format",
            "json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(summary["processed"], 40);
    assert_eq!(summary["failed"], 0);
    assert_eq!(summary["workers"], 6);
    assert_eq!(summary["canceled"], false);
    assert_eq!(summary["reports"].as_array().unwrap().len(), 6);
    assert_eq!(summary["progress"]["processed"], 40);
}

#[test]
fn test_run_logs_progress_milestones() {
    let dir = TempDir::new().unwrap();
    let assert = drainpool(&dir)
        .args([
            "run",
            "--items",
            "20",
            "--workers",
            "4",
            "--delay-ms",
            "1",
            "--progress",
            "log",
            "--log-every",
            "5",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("20 items processed"));

    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    let milestones: Vec<&str> = stderr
        .lines()
        .filter_map(|line| line.strip_suffix(" out of 20 processed."))
        .filter_map(|head| head.split_whitespace().last())
        .collect();
    assert_eq!(milestones, ["5", "10", "15", "20"], "stderr:\n{stderr}");
}

#[test]
fn test_version_command() {
    let dir = TempDir::new().unwrap();
    drainpool(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "drainpool v{}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_run_counts_injected_failures() {
    let dir = TempDir::new().unwrap();
    let output = drainpool(&dir)
        .args([
            "run",
            "--items",
            "30",
            "--workers",
            "3",
            "--delay-ms",
            "0",
            "--fail-every",
            "10",
            "--progress",
            "silent",
            "--format",
            "json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(summary["processed"], 27);
    assert_eq!(summary["failed"], 3);
}

#[test]
fn test_run_with_rendezvous_queue() {
    let dir = TempDir::new().unwrap();
    drainpool(&dir)
        .args([
            "run",
            "-n",
            "25",
            "-w",
            "2",
            "--delay-ms",
            "0",
            "--queue-capacity",
            "0",
            "--progress",
            "bar",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("25 items processed"));
}

#[test]
fn test_config_file_and_env_layering() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("custom.yaml");
    fs::write(&config_path, "pool:\n  workers: 7\ndemo:\n  items: 12\n").unwrap();

    let output = drainpool(&dir)
        .args(["config", "show", "--format", "json", "--config"])
        .arg(&config_path)
        .env("DRAINPOOL_DEMO__DELAY_MS", "3")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let config: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(config["pool"]["workers"], 7);
    assert_eq!(config["demo"]["items"], 12);
    assert_eq!(config["demo"]["delay_ms"], 3);
    assert_eq!(config["progress"]["mode"], "log");
}

#[test]
fn test_project_config_is_discovered() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("drainpool.toml"), "[progress]\nmode = \"bar\"\n").unwrap();

    drainpool(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mode = \"bar\""));
}

#[test]
fn test_config_validate_rejects_bad_values() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("bad.toml");
    fs::write(&config_path, "[pool]\nthread_percentage = 0\n").unwrap();

    drainpool(&dir)
        .args(["config", "validate", "--config"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("thread_percentage"));
}

#[test]
fn test_config_validate_accepts_defaults() {
    let dir = TempDir::new().unwrap();
    drainpool(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}
