//! Integration tests for the CLI interface
//!
//! Tests argument handling, exit codes and the labelled output of the binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_cli_help_flag() {
    let mut cmd = Command::cargo_bin("procmux").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--flush-timeout"));
}

#[test]
fn test_cli_requires_command() {
    let mut cmd = Command::cargo_bin("procmux").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_named_command_output() {
    let mut cmd = Command::cargo_bin("procmux").unwrap();
    cmd.args(["-n", "greeter", "echo hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains("greeter:"))
        .stdout(predicate::str::contains(" | hello"));
}

#[test]
fn test_unnamed_command_uses_executable() {
    let mut cmd = Command::cargo_bin("procmux").unwrap();
    cmd.arg("echo one")
        .assert()
        .success()
        .stdout(predicate::str::contains("echo:"));
}

#[test]
fn test_child_sees_forced_sequences() {
    let mut cmd = Command::cargo_bin("procmux").unwrap();
    cmd.arg("printenv FORCE_TERMINAL_SEQUENCES")
        .assert()
        .success()
        .stdout(predicate::str::contains(" | 1"));
}

#[test]
fn test_any_failure_sets_exit_code() {
    let mut cmd = Command::cargo_bin("procmux").unwrap();
    cmd.args(["echo fine", "sh -c false"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(" | fine"))
        .stderr(predicate::str::contains("exited with code 1"));
}

#[test]
fn test_missing_program_reported() {
    let mut cmd = Command::cargo_bin("procmux").unwrap();
    cmd.arg("nonexistent-command-12345")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Command not found"));
}

#[test]
fn test_more_names_than_commands() {
    let mut cmd = Command::cargo_bin("procmux").unwrap();
    cmd.args(["-n", "a", "-n", "b", "echo one"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("2 names given for 1 commands"));
}

#[test]
fn test_invalid_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("procmux.toml");
    std::fs::write(&config_path, "no_such_setting = true\n").unwrap();

    let mut cmd = Command::cargo_bin("procmux").unwrap();
    cmd.arg("-c")
        .arg(&config_path)
        .arg("echo never")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_invalid_flush_timeout() {
    let mut cmd = Command::cargo_bin("procmux").unwrap();
    cmd.args(["--flush-timeout", "soon", "echo never"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}
