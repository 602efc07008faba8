//! Basic CLI tests for the ecoroute command-line interface.

use assert_cmd::Command;
use predicates::prelude::*;

// Include command-specific test modules
mod commands;

/// Test that the CLI binary exists and shows help.
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("ecoroute").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("carbon and latency aware"))
        .stdout(predicate::str::contains("intensity"))
        .stdout(predicate::str::contains("estimate"))
        .stdout(predicate::str::contains("decide"))
        .stdout(predicate::str::contains("train"))
        .stdout(predicate::str::contains("record"))
        .stdout(predicate::str::contains("bundle"))
        .stdout(predicate::str::contains("run"));
}

/// Test that the CLI shows version information.
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("ecoroute").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ecoroute"));
}

/// Test that providing no subcommand shows an error.
#[test]
fn test_no_subcommand_shows_error() {
    let mut cmd = Command::cargo_bin("ecoroute").unwrap();

    // Clap's error code for a missing required subcommand
    cmd.assert().failure().code(2);
}

/// Test that a missing explicit config file is reported.
#[test]
fn test_missing_config_file() {
    let mut cmd = Command::cargo_bin("ecoroute").unwrap();
    cmd.arg("--config")
        .arg("/nonexistent/ecoroute.toml")
        .arg("intensity")
        .arg("SE");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Cannot read"));
}
