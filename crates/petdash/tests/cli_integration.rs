//! CLI integration tests for the petdash command-line interface.
//!
//! These tests never reach a remote API: they cover argument parsing,
//! config discovery and a refresh with no sources configured.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A petdash command isolated from the host's config and data dirs.
fn petdash(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("petdash").unwrap();
    cmd.current_dir(dir.path())
        .env("PETDASH_CONFIG_DIR", dir.path().join("config"))
        .env("PETDASH_DATA_DIR", dir.path().join("data"));
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    petdash(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    petdash(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("petdash"));
}

#[test]
fn test_unknown_subcommand_rejected() {
    let dir = TempDir::new().unwrap();
    petdash(&dir).arg("feed-the-cat").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_config_dir() {
    let dir = TempDir::new().unwrap();
    petdash(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_then_which() {
    let dir = TempDir::new().unwrap();

    petdash(&dir)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));
    assert!(dir.path().join("config").join("config.toml").is_file());

    petdash(&dir)
        .args(["config", "which"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 config file(s) loaded"));
}

#[test]
fn test_config_show_redacts_passwords() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("petdash.toml"),
        r#"
[sources.petkit]
kind = "device_hub"
base_url = "https://hub.example.com"
username = "cat@example.com"
password = "hunter2"
"#,
    )
    .unwrap();

    petdash(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("petkit"))
        .stdout(predicate::str::contains("hunter2").not())
        .stderr(predicate::str::contains("plaintext password"));
}

#[test]
fn test_config_show_json() {
    let dir = TempDir::new().unwrap();
    let output = petdash(&dir)
        .args(["--json", "config", "show"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value["loaded_from"].as_array().unwrap().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Refresh Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_refresh_without_sources_succeeds() {
    let dir = TempDir::new().unwrap();
    petdash(&dir)
        .arg("refresh")
        .assert()
        .success()
        .stdout(predicate::str::contains("No sources configured"));
}

#[test]
fn test_refresh_unknown_source_fails() {
    let dir = TempDir::new().unwrap();
    petdash(&dir)
        .args(["refresh", "--source", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown refresh source"));
}

#[test]
fn test_refresh_missing_credentials_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("petdash.toml"),
        r#"
[sources.cli_test_feeder]
kind = "feeder"
base_url = "http://127.0.0.1:9"
"#,
    )
    .unwrap();

    petdash(&dir)
        .arg("refresh")
        .assert()
        .failure()
        .stderr(predicate::str::contains("PETDASH_CLI_TEST_FEEDER_USERNAME"));
}
