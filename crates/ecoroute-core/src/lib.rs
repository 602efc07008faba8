//! Core types and helpers for EcoRoute.
//!
//! This crate defines the data model shared by every other crate in the
//! workspace: the fixed feature schema used by the rule engine, the telemetry
//! row recorded after each run, energy/CO2 accounting, acceptance margins and
//! the engine configuration.

pub mod config;
pub mod decision;
pub mod energy;
pub mod error;
pub mod features;
pub mod margin;
pub mod telemetry;

pub use config::EngineConfig;
pub use decision::Decision;
pub use energy::{EnergyError, EnergyEstimate, estimate};
pub use error::{Error, Result};
pub use features::{FEATURE_COUNT, FeatureName, FeatureVector};
pub use margin::{Margins, SiteCost};
pub use telemetry::{RawTelemetryRow, TelemetryRow};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{CandidateConfig, EngineConfig, defaults, env_vars};
    pub use crate::decision::Decision;
    pub use crate::energy::{EnergyEstimate, estimate};
    pub use crate::error::{Error, Result};
    pub use crate::features::{FeatureName, FeatureVector};
    pub use crate::margin::{Margins, SiteCost};
    pub use crate::telemetry::{RawTelemetryRow, TelemetryRow};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
