//! Tests for `record`, `train` and the `bundle` subcommands.

use ecoroute_core::{FeatureVector, TelemetryRow};
use ecoroute_storage::TelemetryDataset;
use predicates::prelude::*;

use super::Workspace;

pub fn labelled_row(rtt_ms: f64, offload_better: u8) -> TelemetryRow {
    let mut row = TelemetryRow {
        timestamp: 1_700_000_000.0,
        local_time_s: 12.0,
        cloud_time_s: 8.0,
        local_ok: true,
        cloud_ok: true,
        cloud_http_status: 200,
        offload_better: Some(offload_better),
        ..Default::default()
    };
    row.set_features(&FeatureVector {
        input_size_bytes: 20_000,
        rtt_ms,
        cpu_percent: 40.0,
        battery_percent: Some(80.0),
        is_charging: Some(true),
        gpu_available: false,
    });
    row
}

/// Seed the workspace dataset with rows separable on rtt.
pub fn seed_dataset(ws: &Workspace) {
    let dataset = TelemetryDataset::new(ws.path().join("telemetry.csv"));
    for _ in 0..10 {
        for (rtt, label) in [(10.0, 0), (20.0, 0), (300.0, 1), (400.0, 1)] {
            dataset.append(&labelled_row(rtt, label)).unwrap();
        }
    }
}

#[test]
fn test_bundle_requires_subcommand() {
    let ws = Workspace::new();
    ws.cmd().arg("bundle").assert().failure().code(2);
}

#[test]
fn test_show_without_bundle() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["bundle", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No rule bundle stored"));
}

#[test]
fn test_train_without_data_fails() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("train")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Training failed"));

    ws.cmd()
        .args(["bundle", "list"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_record_appends_row() {
    let ws = Workspace::new();
    let row = serde_json::to_string(&labelled_row(42.0, 1)).unwrap();

    ws.cmd().arg("record").arg(&row).assert().success();
    ws.cmd().arg("record").write_stdin(row).assert().success();

    let dataset = TelemetryDataset::new(ws.path().join("telemetry.csv"));
    let rows = dataset.read_all().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].rtt_ms, Some(42.0));
}

#[test]
fn test_record_rejects_invalid_json() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["record", "{\"rtt_ms\": 3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid telemetry row"));
}

#[test]
fn test_train_show_export_import() {
    let ws = Workspace::new();
    seed_dataset(&ws);

    ws.cmd()
        .arg("train")
        .assert()
        .success()
        .stdout(predicate::str::contains("IF rtt_ms"))
        .stdout(predicate::str::contains("\"version\": 1"));

    ws.cmd()
        .args(["bundle", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("version 1"))
        .stdout(predicate::str::contains("THEN cloud"));

    let exported = ws.path().join("bundle.json");
    ws.cmd()
        .args(["bundle", "export"])
        .arg(&exported)
        .assert()
        .success()
        .stdout(predicate::str::contains("exported version 1"));
    assert!(exported.exists());

    ws.cmd()
        .args(["bundle", "import"])
        .arg(&exported)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported as version 2"));

    ws.cmd()
        .args(["bundle", "list"])
        .assert()
        .success()
        .stdout("1\n2\n");

    ws.cmd()
        .args(["bundle", "export", "--version", "7"])
        .arg(ws.path().join("missing.json"))
        .assert()
        .failure();
}

#[test]
fn test_import_rejects_garbage() {
    let ws = Workspace::new();
    let path = ws.path().join("garbage.json");
    std::fs::write(&path, "{\"rules\": 5}").unwrap();

    ws.cmd()
        .args(["bundle", "import"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot import"));
}
