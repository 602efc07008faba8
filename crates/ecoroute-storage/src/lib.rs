//! Persistence for EcoRoute.
//!
//! - [`TelemetryDataset`]: append-only CSV of recorded runs
//! - [`BundleStore`]: versioned rule bundles in an embedded redb database

pub mod bundles;
pub mod dataset;
pub mod error;

pub use bundles::BundleStore;
pub use dataset::TelemetryDataset;
pub use error::{Error, Result};
