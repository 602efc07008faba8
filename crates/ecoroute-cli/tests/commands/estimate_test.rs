//! Tests for the `estimate` command.

use assert_cmd::Command;
use predicates::prelude::*;

use super::Workspace;

#[test]
fn test_estimate_prints_energy_and_co2() {
    let ws = Workspace::new();
    let output = ws
        .cmd()
        .args(["estimate", "--runtime", "3600", "--power", "100", "--intensity", "500"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["energy_kwh"].as_f64(), Some(0.1));
    assert_eq!(value["co2_grams"].as_f64(), Some(50.0));
}

#[test]
fn test_estimate_rejects_negative_runtime() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["estimate", "--runtime=-5", "--power", "65", "--intensity", "700"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("runtime_seconds"));
}

#[test]
fn test_estimate_requires_all_inputs() {
    let mut cmd = Command::cargo_bin("ecoroute").unwrap();
    cmd.args(["estimate", "--runtime", "10"]);

    cmd.assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--power"));
}
