//! Energy and CO2 accounting.
//!
//! `energy_kwh = power_watts * runtime_seconds / 3_600_000` and
//! `co2_grams = energy_kwh * carbon_intensity`. Negative or non-finite inputs
//! are rejected rather than clamped.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Joules (watt-seconds) in one kilowatt-hour.
pub const JOULES_PER_KWH: f64 = 3_600_000.0;

/// Energy and emissions for one run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyEstimate {
    pub energy_kwh: f64,
    pub co2_grams: f64,
}

/// Rejected accounting input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnergyError {
    #[error("{field} must be a non-negative finite number, got {value}")]
    Negative { field: &'static str, value: f64 },
}

impl From<EnergyError> for Error {
    fn from(e: EnergyError) -> Self {
        Error::Validation(e.to_string())
    }
}

fn check(field: &'static str, value: f64) -> Result<f64, EnergyError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(EnergyError::Negative { field, value })
    }
}

/// Estimate energy use and emissions for a run.
///
/// `carbon_intensity` is in gCO2/kWh.
pub fn estimate(
    runtime_seconds: f64,
    power_watts: f64,
    carbon_intensity: f64,
) -> Result<EnergyEstimate, EnergyError> {
    let runtime_seconds = check("runtime_seconds", runtime_seconds)?;
    let power_watts = check("power_watts", power_watts)?;
    let carbon_intensity = check("carbon_intensity", carbon_intensity)?;

    let energy_kwh = power_watts * runtime_seconds / JOULES_PER_KWH;
    Ok(EnergyEstimate {
        energy_kwh,
        co2_grams: energy_kwh * carbon_intensity,
    })
}
