//! Integration tests for the `powerdash` CLI binary.
//!
//! Argument parsing, help output, completions, config management and
//! error exits. None of these need a running simulator.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

const NO_HOME: &str = "/tmp/powerdash-cli-test-nonexistent";

/// Build a [`Command`] for the `powerdash` binary with env isolation.
///
/// Clears all `POWERDASH_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn powerdash_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("powerdash");
    cmd.env("HOME", NO_HOME)
        .env("XDG_CONFIG_HOME", NO_HOME)
        .env_remove("POWERDASH_PROFILE")
        .env_remove("POWERDASH_URL")
        .env_remove("POWERDASH_OUTPUT")
        .env_remove("POWERDASH_TIMEOUT")
        .env_remove("POWERDASH_LOG_FILE");
    cmd
}

/// Same as [`powerdash_cmd`] but with a writable config home.
fn powerdash_in(home: &tempfile::TempDir) -> assert_cmd::Command {
    let mut cmd = powerdash_cmd();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path());
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = powerdash_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    powerdash_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("status")
            .and(predicate::str::contains("asset"))
            .and(predicate::str::contains("power"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    powerdash_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("powerdash"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    powerdash_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    powerdash_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_fish() {
    powerdash_cmd()
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = powerdash_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_asset_list_without_simulator_config() {
    powerdash_cmd()
        .args(["asset", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config").or(predicate::str::contains("profile")));
}

#[test]
fn test_unknown_profile_exits_not_found() {
    powerdash_cmd()
        .args(["--profile", "lab", "status"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("lab"));
}

#[test]
fn test_non_websocket_url_is_usage_error() {
    powerdash_cmd()
        .args(["--url", "http://localhost:8000/simengine", "status"])
        .assert()
        .code(2);
}

#[test]
fn test_unreachable_simulator_exits_connection() {
    // Port 9 (discard) on loopback is closed on any sane test host.
    powerdash_cmd()
        .args(["--url", "ws://127.0.0.1:9/simengine", "--timeout", "1", "status"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_output_format() {
    let output = powerdash_cmd()
        .args(["--output", "invalid", "status"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

// ── Config management ───────────────────────────────────────────────

#[test]
fn test_config_show_no_config() {
    // `config show` falls back to the default config when no file exists.
    powerdash_cmd().args(["config", "show"]).assert().success();
}

#[test]
fn test_config_set_then_use_profile() {
    let home = tempfile::tempdir().unwrap();

    powerdash_in(&home)
        .args(["--profile", "lab", "config", "set", "url", "ws://sim:8000/simengine"])
        .assert()
        .success();
    powerdash_in(&home)
        .args(["--profile", "lab", "config", "set", "reconnect_delay_secs", "2"])
        .assert()
        .success();
    powerdash_in(&home)
        .args(["config", "use", "lab"])
        .assert()
        .success();

    powerdash_in(&home)
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lab *"));

    powerdash_in(&home)
        .args(["--output", "json", "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ws://sim:8000/simengine")
                .and(predicate::str::contains("\"reconnect_delay_secs\": 2")),
        );
}

#[test]
fn test_config_set_rejects_unknown_key() {
    let home = tempfile::tempdir().unwrap();
    powerdash_in(&home)
        .args(["config", "set", "colour", "red"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("colour"));
}

#[test]
fn test_config_use_missing_profile() {
    let home = tempfile::tempdir().unwrap();
    powerdash_in(&home)
        .args(["config", "use", "nowhere"])
        .assert()
        .code(4);
}

#[test]
fn test_config_path_under_config_home() {
    let home = tempfile::tempdir().unwrap();
    powerdash_in(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

// ── Subcommand help discovery ───────────────────────────────────────

#[test]
fn test_power_subcommands_exist() {
    powerdash_cmd()
        .args(["power", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("on")
                .and(predicate::str::contains("off"))
                .and(predicate::str::contains("toggle")),
        );
}

#[test]
fn test_recorder_subcommands_exist() {
    powerdash_cmd()
        .args(["recorder", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("enable")
                .and(predicate::str::contains("actions"))
                .and(predicate::str::contains("replay"))
                .and(predicate::str::contains("clear")),
        );
}

#[test]
fn test_layout_subcommands_exist() {
    powerdash_cmd()
        .args(["layout", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("show")
                .and(predicate::str::contains("wires"))
                .and(predicate::str::contains("move")),
        );
}

#[test]
fn test_config_subcommands_exist() {
    powerdash_cmd()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("init")
                .and(predicate::str::contains("show"))
                .and(predicate::str::contains("profiles")),
        );
}
