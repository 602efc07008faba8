//! Outcome accounting: measured runs to a telemetry row.

use std::sync::Arc;

use chrono::Utc;
use ecoroute_carbon::CarbonIntensityProvider;
use ecoroute_core::config::{CandidateConfig, LocalConfig};
use ecoroute_core::{EnergyError, FeatureVector, Margins, TelemetryRow, estimate};

/// Wall-clock results of running one task locally and on one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunPair {
    pub local_time_s: f64,
    pub local_ok: bool,
    pub cloud_time_s: f64,
    pub cloud_ok: bool,
    /// 0 when no HTTP response arrived.
    pub cloud_http_status: u16,
}

/// Builds complete telemetry rows from measured runs.
pub struct OutcomeBuilder {
    provider: Arc<CarbonIntensityProvider>,
    local: LocalConfig,
    margins: Margins,
}

impl OutcomeBuilder {
    /// `margins` label the row; both bounds are strict.
    pub fn new(provider: Arc<CarbonIntensityProvider>, local: LocalConfig, margins: Margins) -> Self {
        Self {
            provider,
            local,
            margins,
        }
    }

    pub async fn build(
        &self,
        features: &FeatureVector,
        run: &RunPair,
        candidate: &CandidateConfig,
    ) -> Result<TelemetryRow, EnergyError> {
        let local_ci = self.provider.intensity(&self.local.zone).await.value;
        let cloud_ci = self.provider.intensity(&candidate.zone).await.value;

        let local = estimate(run.local_time_s, self.local.power_watts, local_ci)?;
        let cloud = estimate(run.cloud_time_s, candidate.power_watts, cloud_ci)?;

        let co2_saved_g = local.co2_grams - cloud.co2_grams;
        let co2_saved_pct = if local.co2_grams > 0.0 {
            co2_saved_g / local.co2_grams * 100.0
        } else {
            0.0
        };

        let mut row = TelemetryRow {
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            local_time_s: run.local_time_s,
            cloud_time_s: run.cloud_time_s,
            local_ok: run.local_ok,
            cloud_ok: run.cloud_ok,
            cloud_http_status: run.cloud_http_status,
            local_ci_g_per_kwh: local_ci,
            cloud_ci_g_per_kwh: cloud_ci,
            local_co2_g: local.co2_grams,
            cloud_co2_g: cloud.co2_grams,
            co2_saved_g,
            co2_saved_pct,
            ..Default::default()
        };
        row.set_features(features);

        // A failed remote run never counts as a better offload.
        let offload_better = match (run.local_ok, run.cloud_ok) {
            (_, false) => false,
            (false, true) => true,
            (true, true) => self
                .margins
                .offload_better(&row.local_cost(), &row.cloud_cost()),
        };
        row.offload_better = Some(offload_better as u8);

        Ok(row)
    }
}
