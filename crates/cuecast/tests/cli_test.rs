#![allow(clippy::unwrap_used)]
//! Integration tests for the `cuecast` CLI binary.
//!
//! Argument parsing, help output, shell completions, config handling and
//! error exit codes, all without a running OBS.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `cuecast` binary with env isolation.
///
/// Clears `CUECAST_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn cuecast_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("cuecast");
    cmd.env("HOME", "/tmp/cuecast-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/cuecast-cli-test-nonexistent")
        .env_remove("CUECAST_PROFILE")
        .env_remove("CUECAST_URL")
        .env_remove("CUECAST_OUTPUT")
        .env_remove("CUECAST_TIMEOUT")
        .env_remove("CUECAST_DEFAULT_PROFILE")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// A local port with nothing listening on it.
fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("ws://127.0.0.1:{port}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = cuecast_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    cuecast_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("OBS")
            .and(predicate::str::contains("status"))
            .and(predicate::str::contains("batch"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    cuecast_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cuecast"));
}

#[test]
fn test_invalid_subcommand() {
    cuecast_cmd()
        .arg("teleport")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_invalid_output_format() {
    cuecast_cmd()
        .args(["--output", "xml", "status"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_batch_requires_file() {
    cuecast_cmd()
        .arg("batch")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("<FILE>"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    cuecast_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cuecast"));
}

#[test]
fn test_completions_zsh() {
    cuecast_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path() {
    cuecast_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_without_file() {
    cuecast_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No profiles configured"));
}

#[test]
fn test_config_show_json() {
    let output = cuecast_cmd()
        .args(["config", "show", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["default_profile"], "default");
    assert_eq!(value["defaults"]["timeout"], 15);
}

// ── Connection errors ───────────────────────────────────────────────

#[test]
fn test_status_without_obs_exits_with_connection_code() {
    let output = cuecast_cmd()
        .args(["--url", &closed_port_url(), "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7), "{}", combined_output(&output));
}

#[test]
fn test_non_websocket_url_is_rejected() {
    let output = cuecast_cmd()
        .args(["--url", "http://127.0.0.1:4455", "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("ws://"));
}

#[test]
fn test_unknown_profile() {
    let output = cuecast_cmd()
        .args(["--profile", "studio-b", "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("studio-b"));
}

#[test]
fn test_missing_password_env_var() {
    let output = cuecast_cmd()
        .env_remove("CUECAST_TEST_MISSING_PW")
        .args(["--password-env", "CUECAST_TEST_MISSING_PW", "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("CUECAST_TEST_MISSING_PW"));
}
