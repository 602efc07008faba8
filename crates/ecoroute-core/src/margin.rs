//! Multiplicative slack applied to the local baseline.
//!
//! Two pairs are in use: a strict pair for labelling recorded runs
//! (default 0.85 / 1.2) and a looser pair for choosing among remote
//! candidates (default 1.2 / 2.0). Both are configuration.

use serde::{Deserialize, Serialize};

/// Estimated or measured cost of running a task at one site.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SiteCost {
    pub time_seconds: f64,
    pub co2_grams: f64,
}

impl SiteCost {
    pub fn new(time_seconds: f64, co2_grams: f64) -> Self {
        Self {
            time_seconds,
            co2_grams,
        }
    }
}

/// Carbon and time margins relative to local execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    /// Remote CO2 may be at most `local * carbon_margin`.
    pub carbon_margin: f64,
    /// Remote time may be at most `local * time_margin`.
    pub time_margin: f64,
}

impl Margins {
    /// Default pair for labelling recorded runs.
    pub const LABELING: Margins = Margins {
        carbon_margin: 0.85,
        time_margin: 1.2,
    };

    /// Default pair for comparing remote candidates.
    pub const SELECTION: Margins = Margins {
        carbon_margin: 1.2,
        time_margin: 2.0,
    };

    pub fn new(carbon_margin: f64, time_margin: f64) -> Self {
        Self {
            carbon_margin,
            time_margin,
        }
    }

    /// Whether a remote candidate is acceptable against the local baseline.
    /// Both bounds are inclusive.
    pub fn accepts(&self, local: &SiteCost, remote: &SiteCost) -> bool {
        remote.co2_grams <= local.co2_grams * self.carbon_margin
            && remote.time_seconds <= local.time_seconds * self.time_margin
    }

    /// Label for a recorded run: offloading was better. Both bounds are strict.
    pub fn offload_better(&self, local: &SiteCost, remote: &SiteCost) -> bool {
        remote.co2_grams < local.co2_grams * self.carbon_margin
            && remote.time_seconds < local.time_seconds * self.time_margin
    }
}

impl Default for Margins {
    fn default() -> Self {
        Margins::LABELING
    }
}
