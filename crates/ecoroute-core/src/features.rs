//! The fixed six-feature schema consumed by the rule engine.
//!
//! Rules compare features as plain `f64` values. Readings a probe could not
//! obtain (battery level and charging state on a desktop, for example) are
//! encoded as [`UNKNOWN`] so that training rows and live decisions share one
//! numeric representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Number of features in the schema.
pub const FEATURE_COUNT: usize = 6;

/// Numeric encoding for a reading that is not available.
pub const UNKNOWN: f64 = -1.0;

/// Name of one feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    InputSizeBytes,
    RttMs,
    CpuPercent,
    BatteryPercent,
    IsCharging,
    GpuAvailable,
}

impl FeatureName {
    /// All features in schema order.
    pub const ALL: [FeatureName; FEATURE_COUNT] = [
        FeatureName::InputSizeBytes,
        FeatureName::RttMs,
        FeatureName::CpuPercent,
        FeatureName::BatteryPercent,
        FeatureName::IsCharging,
        FeatureName::GpuAvailable,
    ];

    /// Column name as written in the dataset and in rule bundles.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::InputSizeBytes => "input_size_bytes",
            FeatureName::RttMs => "rtt_ms",
            FeatureName::CpuPercent => "cpu_percent",
            FeatureName::BatteryPercent => "battery_percent",
            FeatureName::IsCharging => "is_charging",
            FeatureName::GpuAvailable => "gpu_available",
        }
    }

    /// Position of the feature in [`FeatureName::ALL`].
    pub fn index(&self) -> usize {
        match self {
            FeatureName::InputSizeBytes => 0,
            FeatureName::RttMs => 1,
            FeatureName::CpuPercent => 2,
            FeatureName::BatteryPercent => 3,
            FeatureName::IsCharging => 4,
            FeatureName::GpuAvailable => 5,
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureName::ALL
            .into_iter()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| Error::Validation(format!("Unknown feature: {}", s)))
    }
}

/// Current device and network state for one task.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Size of the task archive in bytes.
    pub input_size_bytes: u64,
    /// Round-trip time to the network, in milliseconds.
    pub rtt_ms: f64,
    /// Current CPU utilisation, 0-100.
    pub cpu_percent: f64,
    /// Battery charge, 0-100, when the device has a battery.
    #[serde(default)]
    pub battery_percent: Option<f64>,
    /// Whether the device is on external power, when known.
    #[serde(default)]
    pub is_charging: Option<bool>,
    /// Whether a usable GPU is present.
    #[serde(default)]
    pub gpu_available: bool,
}

impl FeatureVector {
    /// Numeric value of a single feature.
    pub fn value(&self, feature: FeatureName) -> f64 {
        match feature {
            FeatureName::InputSizeBytes => self.input_size_bytes as f64,
            FeatureName::RttMs => self.rtt_ms,
            FeatureName::CpuPercent => self.cpu_percent,
            FeatureName::BatteryPercent => self.battery_percent.unwrap_or(UNKNOWN),
            FeatureName::IsCharging => match self.is_charging {
                Some(true) => 1.0,
                Some(false) => 0.0,
                None => UNKNOWN,
            },
            FeatureName::GpuAvailable => {
                if self.gpu_available {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// All feature values in schema order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        FeatureName::ALL.map(|f| self.value(f))
    }

    /// Decode a vector from its numeric encoding.
    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        let [size, rtt, cpu, battery, charging, gpu] = values;
        Self {
            input_size_bytes: if size > 0.0 { size as u64 } else { 0 },
            rtt_ms: rtt,
            cpu_percent: cpu,
            battery_percent: (battery >= 0.0).then_some(battery),
            is_charging: (charging >= 0.0).then_some(charging > 0.0),
            gpu_available: gpu > 0.0,
        }
    }

    /// True when the battery is known, below `floor_percent`, and the device
    /// is known not to be charging.
    pub fn battery_critical(&self, floor_percent: f64) -> bool {
        match (self.battery_percent, self.is_charging) {
            (Some(level), Some(false)) => level < floor_percent,
            _ => false,
        }
    }
}
