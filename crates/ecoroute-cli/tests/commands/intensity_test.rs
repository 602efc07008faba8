//! Tests for the `intensity` command. Only zones that never reach the
//! network are used.

use super::Workspace;

fn intensity(ws: &Workspace, zone: &str) -> serde_json::Value {
    let output = ws.cmd().args(["intensity", zone]).output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_fixed_zone() {
    let ws = Workspace::new();
    let sample = intensity(&ws, "se-se4");

    assert_eq!(sample["zone"], "SE-SE4");
    assert_eq!(sample["value"].as_f64(), Some(50.0));
    assert_eq!(sample["source"], "fixed");
}

#[test]
fn test_unclassified_zone_uses_default() {
    let ws = Workspace::new();
    let sample = intensity(&ws, "DE");

    assert_eq!(sample["value"].as_f64(), Some(400.0));
    assert_eq!(sample["source"], "fallback");
}

#[test]
fn test_live_zone_without_token_falls_back() {
    let ws = Workspace::new();
    let sample = intensity(&ws, "IN-WE");

    assert_eq!(sample["value"].as_f64(), Some(700.0));
    assert_eq!(sample["source"], "fallback");
}
