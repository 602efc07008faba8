//! Carbon-intensity lookup for EcoRoute.
//!
//! ## Features
//!
//! - **Zone catalog**: classifies zone codes as live, fixed or unclassified
//! - **Live client**: fetches the latest intensity from a carbon-data API
//! - **Provider**: TTL cache with a fallback policy; lookups never fail
//!
//! ## Example
//!
//! ```rust,no_run
//! use ecoroute_carbon::CarbonIntensityProvider;
//! use ecoroute_core::config::CarbonConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = CarbonIntensityProvider::from_config(&CarbonConfig::default())?;
//!     let sample = provider.intensity("in-we").await;
//!     println!("{} gCO2/kWh ({})", sample.value, sample.source);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod provider;
pub mod zones;

pub use client::{CarbonFetcher, ElectricityMapsClient, LookupFailure};
pub use provider::{CacheStats, CarbonIntensityProvider, CarbonSample, CarbonSource};
pub use zones::{ZoneCatalog, ZoneClass};
