//! Live client tests against a local mock carbon API.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use ecoroute_carbon::{CarbonFetcher, ElectricityMapsClient, LookupFailure};
use serde_json::{Value, json};

const TOKEN: &str = "test-token";

async fn latest(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if headers.get("auth-token").and_then(|v| v.to_str().ok()) != Some(TOKEN) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad token"})));
    }
    match params.get("zone").map(String::as_str) {
        Some("IN-WE") => (
            StatusCode::OK,
            Json(json!({"zone": "IN-WE", "carbonIntensity": 632})),
        ),
        Some("BROKEN") => (StatusCode::OK, Json(json!({"zone": "BROKEN"}))),
        Some("SLOW") => {
            tokio::time::sleep(Duration::from_millis(500)).await;
            (StatusCode::OK, Json(json!({"carbonIntensity": 1})))
        }
        _ => (StatusCode::NOT_FOUND, Json(json!({"error": "unknown zone"}))),
    }
}

/// Start the mock API and return its base URL.
async fn spawn_mock_api() -> String {
    let app = Router::new().route("/v3/carbon-intensity/latest", get(latest));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v3", addr)
}

#[tokio::test]
async fn test_fetch_success() {
    let base = spawn_mock_api().await;
    let client = ElectricityMapsClient::new(base, Some(TOKEN.to_string())).unwrap();

    assert_eq!(client.fetch("IN-WE").await, Ok(632.0));
}

#[tokio::test]
async fn test_bad_token_reports_status() {
    let base = spawn_mock_api().await;
    let client = ElectricityMapsClient::new(base, Some("wrong".to_string())).unwrap();

    assert_eq!(
        client.fetch("IN-WE").await,
        Err(LookupFailure::HttpStatus(401))
    );
}

#[tokio::test]
async fn test_unknown_zone_reports_status() {
    let base = spawn_mock_api().await;
    let client = ElectricityMapsClient::new(base, Some(TOKEN.to_string())).unwrap();

    assert_eq!(
        client.fetch("XX").await,
        Err(LookupFailure::HttpStatus(404))
    );
}

#[tokio::test]
async fn test_missing_field_is_malformed() {
    let base = spawn_mock_api().await;
    let client = ElectricityMapsClient::new(base, Some(TOKEN.to_string())).unwrap();

    assert!(matches!(
        client.fetch("BROKEN").await,
        Err(LookupFailure::MalformedPayload(_))
    ));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let base = spawn_mock_api().await;
    let client = ElectricityMapsClient::new(base, Some(TOKEN.to_string()))
        .unwrap()
        .with_timeout(Duration::from_millis(100));

    assert_eq!(client.fetch("SLOW").await, Err(LookupFailure::Timeout));
}

#[tokio::test]
async fn test_unreachable_host_is_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        ElectricityMapsClient::new(format!("http://{}", addr), Some(TOKEN.to_string())).unwrap();
    assert!(matches!(
        client.fetch("IN-WE").await,
        Err(LookupFailure::Connection(_))
    ));
}
