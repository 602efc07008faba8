//! Tests for the `decide` and `run` commands.

use predicates::prelude::*;

use super::Workspace;
use super::bundle_test::seed_dataset;

fn decide(ws: &Workspace, args: &[&str]) -> serde_json::Value {
    let output = ws.cmd().arg("decide").args(args).output().unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_margin_comparison_without_bundle() {
    let ws = Workspace::new();

    // Local: DE at 400 g/kWh and 65 W. Stockholm: 50 g/kWh and 15 W.
    let result = decide(
        &ws,
        &["--estimate", "local=10", "--estimate", "stockholm=11"],
    );
    assert_eq!(result["bundleVersion"], serde_json::Value::Null);
    assert_eq!(result["outcome"]["decision"], "cloud");
    assert_eq!(result["outcome"]["candidate"], "stockholm");
    assert_eq!(result["outcome"]["reason"]["kind"], "margin_comparison");

    // Too slow: more than twice the local time.
    let result = decide(
        &ws,
        &["--estimate", "local=10", "--estimate", "stockholm=25"],
    );
    assert_eq!(result["outcome"]["decision"], "local");
}

#[test]
fn test_unreadable_bundle_store_falls_back_to_margins() {
    let ws = Workspace::new();
    std::fs::create_dir(ws.path().join("bundles.redb")).unwrap();

    let output = ws
        .cmd()
        .args(["decide", "--estimate", "local=10", "--estimate", "stockholm=11"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("Cannot read rule bundle"));

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["bundleVersion"], serde_json::Value::Null);
    assert_eq!(result["outcome"]["decision"], "cloud");
    assert_eq!(result["outcome"]["reason"]["kind"], "margin_comparison");
}

#[test]
fn test_no_estimates_stays_local() {
    let ws = Workspace::new();
    let result = decide(&ws, &["--rtt-ms", "30"]);
    assert_eq!(result["outcome"]["decision"], "local");
}

#[test]
fn test_battery_override() {
    let ws = Workspace::new();
    let result = decide(
        &ws,
        &["--battery-percent", "3", "--charging", "false"],
    );
    assert_eq!(result["outcome"]["decision"], "cloud");
    assert_eq!(result["outcome"]["reason"]["kind"], "battery_override");

    // Charging state unknown: no override.
    let result = decide(&ws, &["--battery-percent", "3"]);
    assert_eq!(result["outcome"]["decision"], "local");
}

#[test]
fn test_unknown_candidate() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["decide", "--estimate", "local=10", "--estimate", "tokyo=3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown candidate: tokyo"));
}

#[test]
fn test_malformed_estimate() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["decide", "--estimate", "local"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("NAME=SECONDS"));
}

#[test]
fn test_rules_decide_after_training() {
    let ws = Workspace::new();
    seed_dataset(&ws);
    ws.cmd().arg("train").assert().success();

    let far = decide(&ws, &["--rtt-ms", "350", "--cpu-percent", "40"]);
    assert_eq!(far["bundleVersion"], 1);
    assert_eq!(far["outcome"]["decision"], "cloud");
    assert_eq!(far["outcome"]["reason"]["kind"], "rule_matched");

    let near = decide(&ws, &["--rtt-ms", "15", "--cpu-percent", "40"]);
    assert_eq!(near["outcome"]["decision"], "local");
}

#[test]
fn test_run_requires_archive() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("run")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--archive"));
}

#[test]
fn test_run_missing_archive_file() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["run", "--archive", "does-not-exist.zip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot read archive"));
}
