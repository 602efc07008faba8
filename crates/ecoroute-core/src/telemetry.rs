//! Telemetry rows recorded after each run.
//!
//! [`TelemetryRow`] is the strict, fully-typed row the agent writes. The
//! dataset file is read back as [`RawTelemetryRow`], where every numeric cell
//! is parsed permissively: a cell that is empty or not a number becomes
//! `None` and the row is judged later, at training time.

use serde::{Deserialize, Deserializer, Serialize};

use crate::features::{FEATURE_COUNT, FeatureName, FeatureVector, UNKNOWN};
use crate::margin::{Margins, SiteCost};

/// Dataset column names, in file order.
pub const COLUMNS: [&str; 19] = [
    "timestamp",
    "input_size_bytes",
    "local_time_s",
    "cloud_time_s",
    "local_ok",
    "cloud_ok",
    "cloud_http_status",
    "rtt_ms",
    "cpu_percent",
    "battery_percent",
    "is_charging",
    "gpu_available",
    "local_ci_g_per_kwh",
    "cloud_ci_g_per_kwh",
    "local_co2_g",
    "cloud_co2_g",
    "co2_saved_g",
    "co2_saved_pct",
    "offload_better",
];

/// One observation of features and measured outcomes for a task run.
///
/// Field order matches [`COLUMNS`]; the CSV writer relies on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRow {
    /// Unix time in seconds.
    pub timestamp: f64,
    pub input_size_bytes: u64,
    pub local_time_s: f64,
    pub cloud_time_s: f64,
    pub local_ok: bool,
    pub cloud_ok: bool,
    /// HTTP status of the remote run, 0 when no response was received.
    pub cloud_http_status: u16,
    pub rtt_ms: f64,
    pub cpu_percent: f64,
    /// Battery percent or `-1` when unknown.
    pub battery_percent: f64,
    /// `1` charging, `0` discharging, `-1` unknown.
    pub is_charging: i8,
    pub gpu_available: u8,
    pub local_ci_g_per_kwh: f64,
    pub cloud_ci_g_per_kwh: f64,
    pub local_co2_g: f64,
    pub cloud_co2_g: f64,
    pub co2_saved_g: f64,
    pub co2_saved_pct: f64,
    /// `1` if offloading was better, `0` if not, empty when unlabelled.
    pub offload_better: Option<u8>,
}

impl TelemetryRow {
    /// Feature vector recorded in this row.
    pub fn features(&self) -> FeatureVector {
        FeatureVector::from_array([
            self.input_size_bytes as f64,
            self.rtt_ms,
            self.cpu_percent,
            self.battery_percent,
            self.is_charging as f64,
            self.gpu_available as f64,
        ])
    }

    /// Copy the feature columns from a vector.
    pub fn set_features(&mut self, features: &FeatureVector) {
        self.input_size_bytes = features.input_size_bytes;
        self.rtt_ms = features.rtt_ms;
        self.cpu_percent = features.cpu_percent;
        self.battery_percent = features.value(FeatureName::BatteryPercent);
        self.is_charging = features.value(FeatureName::IsCharging) as i8;
        self.gpu_available = features.value(FeatureName::GpuAvailable) as u8;
    }

    pub fn local_cost(&self) -> SiteCost {
        SiteCost::new(self.local_time_s, self.local_co2_g)
    }

    pub fn cloud_cost(&self) -> SiteCost {
        SiteCost::new(self.cloud_time_s, self.cloud_co2_g)
    }
}

impl Default for TelemetryRow {
    fn default() -> Self {
        Self {
            timestamp: 0.0,
            input_size_bytes: 0,
            local_time_s: 0.0,
            cloud_time_s: 0.0,
            local_ok: false,
            cloud_ok: false,
            cloud_http_status: 0,
            rtt_ms: 0.0,
            cpu_percent: 0.0,
            battery_percent: UNKNOWN,
            is_charging: -1,
            gpu_available: 0,
            local_ci_g_per_kwh: 0.0,
            cloud_ci_g_per_kwh: 0.0,
            local_co2_g: 0.0,
            cloud_co2_g: 0.0,
            co2_saved_g: 0.0,
            co2_saved_pct: 0.0,
            offload_better: None,
        }
    }
}

/// A dataset row as read back from disk, before cleaning.
///
/// Only the columns training needs are kept; others are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawTelemetryRow {
    #[serde(deserialize_with = "lenient_f64")]
    pub input_size_bytes: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub rtt_ms: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub cpu_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub battery_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub is_charging: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub gpu_available: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub local_time_s: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub cloud_time_s: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub local_co2_g: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub cloud_co2_g: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub offload_better: Option<f64>,
}

/// Outcome label for one raw row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub offload_better: bool,
    /// True when the label was computed from the margins instead of read.
    pub derived: bool,
}

impl RawTelemetryRow {
    /// Feature values in schema order, or `None` if any is missing.
    pub fn feature_values(&self) -> Option<[f64; FEATURE_COUNT]> {
        Some([
            self.input_size_bytes?,
            self.rtt_ms?,
            self.cpu_percent?,
            self.battery_percent?,
            self.is_charging?,
            self.gpu_available?,
        ])
    }

    /// Recorded label, or one derived from the measured costs.
    ///
    /// Returns `None` when the label is missing and cannot be derived.
    pub fn label(&self, margins: &Margins) -> Option<Label> {
        if let Some(value) = self.offload_better {
            return Some(Label {
                offload_better: value >= 0.5,
                derived: false,
            });
        }
        let local = SiteCost::new(self.local_time_s?, self.local_co2_g?);
        let cloud = SiteCost::new(self.cloud_time_s?, self.cloud_co2_g?);
        Some(Label {
            offload_better: margins.offload_better(&local, &cloud),
            derived: true,
        })
    }
}

impl From<&TelemetryRow> for RawTelemetryRow {
    fn from(row: &TelemetryRow) -> Self {
        Self {
            input_size_bytes: Some(row.input_size_bytes as f64),
            rtt_ms: Some(row.rtt_ms),
            cpu_percent: Some(row.cpu_percent),
            battery_percent: Some(row.battery_percent),
            is_charging: Some(row.is_charging as f64),
            gpu_available: Some(row.gpu_available as f64),
            local_time_s: Some(row.local_time_s),
            cloud_time_s: Some(row.cloud_time_s),
            local_co2_g: Some(row.local_co2_g),
            cloud_co2_g: Some(row.cloud_co2_g),
            offload_better: row.offload_better.map(f64::from),
        }
    }
}

/// Parse a cell as a number, accepting `true`/`false` as 1/0.
pub fn parse_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.eq_ignore_ascii_case("true") {
        return Some(1.0);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Some(0.0);
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let cell: Option<String> = Option::deserialize(deserializer)?;
    Ok(cell.as_deref().and_then(parse_cell))
}
