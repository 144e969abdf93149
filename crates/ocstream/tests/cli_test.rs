//! Integration tests for the `ocstream` binary.
//!
//! Argument parsing, help output, completions, and the store- and
//! config-editing subcommands. No device or database is needed.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command with env isolation and config/store inside `dir`.
fn ocstream_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ocstream");
    cmd.env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env("XDG_DATA_HOME", dir.join("data"))
        .env_remove("RUST_LOG")
        .env_remove("OCSTREAM_CONFIG")
        .env_remove("OCSTREAM_STORE")
        .env_remove("OCSTREAM_DEVICE_PASSWORD")
        .arg("--config")
        .arg(dir.join("config.toml"))
        .arg("--store")
        .arg(dir.join("devices.json"));
    cmd
}

fn bare_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ocstream");
    cmd.env("HOME", "/tmp/ocstream-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/ocstream-cli-test-nonexistent");
    cmd
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = bare_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "Expected 'Usage' in output:\n{stderr}");
}

#[test]
fn test_help_flag() {
    bare_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("telemetry")
            .and(predicate::str::contains("run"))
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    bare_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ocstream"));
}

#[test]
fn test_completions_zsh() {
    bare_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_invalid_subcommand() {
    bare_cmd().arg("foobar").assert().failure();
}

// ── Devices ─────────────────────────────────────────────────────────

#[test]
fn test_devices_add_list_remove() {
    let dir = tempfile::tempdir().unwrap();

    ocstream_cmd(dir.path())
        .args([
            "devices", "add", "--host", "mx1.lab", "--port", "32767", "--user", "collector",
            "--password", "hunter2", "--path", "/interfaces/@2000",
        ])
        .assert()
        .success();

    let raw = std::fs::read_to_string(dir.path().join("devices.json")).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["mx1.lab"]["port"], 32767);
    assert_eq!(stored["mx1.lab"]["paths"][0]["freq"], 2000);

    ocstream_cmd(dir.path())
        .args(["devices", "list", "--output", "json"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("mx1.lab")
                .and(predicate::str::contains("collector"))
                .and(predicate::str::contains("hunter2").not()),
        );

    ocstream_cmd(dir.path())
        .args(["devices", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mx1.lab:32767"));

    ocstream_cmd(dir.path())
        .args(["devices", "remove", "mx1.lab"])
        .assert()
        .success();

    ocstream_cmd(dir.path())
        .args(["devices", "remove", "mx1.lab"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_devices_add_requires_host() {
    let dir = tempfile::tempdir().unwrap();
    ocstream_cmd(dir.path())
        .args(["devices", "add", "--port", "32767"])
        .assert()
        .failure();
}

#[test]
fn test_devices_add_rejects_port_zero() {
    let dir = tempfile::tempdir().unwrap();
    ocstream_cmd(dir.path())
        .args(["devices", "add", "--host", "mx1.lab", "--port", "0"])
        .assert()
        .code(2);
    assert!(!dir.path().join("devices.json").exists());
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let dir = tempfile::tempdir().unwrap();
    ocstream_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();

    ocstream_cmd(dir.path()).args(["config", "init"]).assert().success();
    assert!(dir.path().join("config.toml").exists());

    ocstream_cmd(dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    ocstream_cmd(dir.path())
        .args(["config", "show"])
        .env("OCSTREAM_SINK__DATABASE", "lab")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("database = \"lab\"")
                .and(predicate::str::contains("batch_size = 10")),
        );
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[sink]\nbatch_size = 0\n").unwrap();

    ocstream_cmd(dir.path())
        .args(["devices", "list"])
        .assert()
        .code(78)
        .stderr(predicate::str::contains("batch_size"));
}
