//! Live carbon-intensity client.
//!
//! Issues `GET <endpoint>/carbon-intensity/latest?zone=<ZONE>` with an
//! `auth-token` header and reads the numeric `carbonIntensity` field.
//! Failures are reported as [`LookupFailure`]; the provider turns them into
//! fallback values, so they never reach callers of the provider.

use std::time::Duration;

use async_trait::async_trait;
use ecoroute_core::config::{CarbonConfig, defaults};
use ecoroute_core::Error;
use reqwest::Client;
use serde_json::Value;

/// Why a live lookup produced no value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupFailure {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("no API token configured")]
    MissingToken,
}

/// Source of live carbon-intensity values.
#[async_trait]
pub trait CarbonFetcher: Send + Sync {
    /// Latest intensity for a canonical zone code, in gCO2/kWh.
    async fn fetch(&self, zone: &str) -> Result<f64, LookupFailure>;
}

/// Client for an ElectricityMaps-compatible API.
pub struct ElectricityMapsClient {
    client: Client,
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
}

impl ElectricityMapsClient {
    /// Create a client for the given API base URL.
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self, Error> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
            timeout: Duration::from_secs(defaults::CARBON_TIMEOUT_SECS),
        })
    }

    pub fn from_config(config: &CarbonConfig) -> Result<Self, Error> {
        Ok(Self::new(config.api_endpoint.clone(), config.api_token.clone())?
            .with_timeout(Duration::from_secs(config.timeout_secs)))
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Extract `carbonIntensity` from a response body.
fn parse_intensity(body: &Value) -> Result<f64, LookupFailure> {
    let field = body
        .get("carbonIntensity")
        .ok_or_else(|| LookupFailure::MalformedPayload("missing carbonIntensity".into()))?;

    let value = match field {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        LookupFailure::MalformedPayload(format!("carbonIntensity is not numeric: {}", field))
    })?;

    if !value.is_finite() || value < 0.0 {
        return Err(LookupFailure::MalformedPayload(format!(
            "carbonIntensity out of range: {}",
            value
        )));
    }
    Ok(value)
}

#[async_trait]
impl CarbonFetcher for ElectricityMapsClient {
    async fn fetch(&self, zone: &str) -> Result<f64, LookupFailure> {
        let token = self.token.as_deref().ok_or(LookupFailure::MissingToken)?;

        let url = format!("{}/carbon-intensity/latest", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("zone", zone)])
            .header("auth-token", token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LookupFailure::Timeout
                } else {
                    LookupFailure::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupFailure::HttpStatus(status.as_u16()));
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LookupFailure::Timeout
            } else {
                LookupFailure::MalformedPayload(e.to_string())
            }
        })?;

        parse_intensity(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_intensity() {
        assert_eq!(parse_intensity(&json!({"carbonIntensity": 612})), Ok(612.0));
        assert_eq!(parse_intensity(&json!({"carbonIntensity": "48.5"})), Ok(48.5));
        assert!(matches!(
            parse_intensity(&json!({"zone": "IN-WE"})),
            Err(LookupFailure::MalformedPayload(_))
        ));
        assert!(matches!(
            parse_intensity(&json!({"carbonIntensity": null})),
            Err(LookupFailure::MalformedPayload(_))
        ));
        assert!(matches!(
            parse_intensity(&json!({"carbonIntensity": -3})),
            Err(LookupFailure::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let client = ElectricityMapsClient::new("http://localhost:9000/v3/", None).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9000/v3");
    }

    #[tokio::test]
    async fn test_missing_token_skips_network() {
        // Port 9 is discard; the request would fail anyway, but must not be sent.
        let client = ElectricityMapsClient::new("http://127.0.0.1:9", None).unwrap();
        assert_eq!(client.fetch("IN-WE").await, Err(LookupFailure::MissingToken));
    }
}
