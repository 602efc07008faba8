//! Engine configuration.
//!
//! Defaults live in the constant modules below so every crate agrees on
//! them. [`EngineConfig`] is read from a TOML file (every field optional)
//! and then patched from environment variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::margin::Margins;

/// Default values.
pub mod defaults {
    pub const CONFIG_FILE: &str = "ecoroute.toml";
    pub const DATASET_PATH: &str = "data/telemetry_labeled.csv";
    pub const BUNDLE_DB_PATH: &str = "data/rule_bundles.redb";

    /// Carbon data request timeout.
    pub const CARBON_TIMEOUT_SECS: u64 = 5;
    /// How long a live intensity value stays cached.
    pub const CACHE_TTL_SECS: u64 = 600;
    /// Intensity reported for fixed low-carbon zones, gCO2/kWh.
    pub const FIXED_INTENSITY: f64 = 50.0;
    /// Intensity reported for zones we know nothing about.
    pub const DEFAULT_INTENSITY: f64 = 400.0;
    /// Fallback for live zones on a known high-carbon grid.
    pub const HIGH_CARBON_FALLBACK: f64 = 700.0;
    /// Fallback for any other live zone.
    pub const GENERIC_FALLBACK: f64 = 400.0;

    pub const BATTERY_FLOOR_PERCENT: f64 = 5.0;

    pub const MAX_DEPTH: usize = 3;
    pub const MIN_SAMPLES_LEAF: usize = 5;
    pub const TEST_FRACTION: f64 = 0.2;
    pub const SEED: u64 = 42;

    pub const LOCAL_ZONE: &str = "IN-WE";
    pub const LOCAL_POWER_WATTS: f64 = 65.0;

    pub const REMOTE_TIMEOUT_SECS: u64 = 300;
    pub const LOCAL_TIMEOUT_SECS: u64 = 600;

    pub const RETRAIN_EVERY: usize = 1;
}

/// Default endpoints.
pub mod endpoints {
    pub const ELECTRICITY_MAPS: &str = "https://api.electricitymap.org/v3";
}

/// Environment variable names.
pub mod env_vars {
    pub const CONFIG: &str = "ECOROUTE_CONFIG";
    pub const CARBON_API_TOKEN: &str = "ECOROUTE_CARBON_API_TOKEN";
    pub const CARBON_API_ENDPOINT: &str = "ECOROUTE_CARBON_API_ENDPOINT";
    pub const DATASET_PATH: &str = "ECOROUTE_DATASET_PATH";
    pub const BUNDLE_DB: &str = "ECOROUTE_BUNDLE_DB";
    pub const LOG_JSON: &str = "ECOROUTE_LOG_JSON";
}

/// A live zone and the zone codes that resolve to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveZoneConfig {
    pub zone: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Carbon-intensity lookup settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarbonConfig {
    pub api_endpoint: String,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub live_zones: Vec<LiveZoneConfig>,
    /// Zones answered from a constant, never fetched.
    pub fixed_zones: BTreeMap<String, f64>,
    pub default_intensity: f64,
    /// Zone prefixes that signal a high-carbon grid.
    pub high_carbon_prefixes: Vec<String>,
    pub high_carbon_fallback: f64,
    pub generic_fallback: f64,
}

impl Default for CarbonConfig {
    fn default() -> Self {
        let fixed_zones = ["SE-SE4", "SE-SE3", "SE"]
            .into_iter()
            .map(|z| (z.to_string(), defaults::FIXED_INTENSITY))
            .collect();
        Self {
            api_endpoint: endpoints::ELECTRICITY_MAPS.to_string(),
            api_token: None,
            timeout_secs: defaults::CARBON_TIMEOUT_SECS,
            cache_ttl_secs: defaults::CACHE_TTL_SECS,
            live_zones: vec![LiveZoneConfig {
                zone: "IN-WE".to_string(),
                aliases: vec!["IN".to_string(), "IN-WEST".to_string()],
            }],
            fixed_zones,
            default_intensity: defaults::DEFAULT_INTENSITY,
            high_carbon_prefixes: vec!["IN".to_string()],
            high_carbon_fallback: defaults::HIGH_CARBON_FALLBACK,
            generic_fallback: defaults::GENERIC_FALLBACK,
        }
    }
}

/// Decision tree training settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Share of rows held out for evaluation, 0 to disable.
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_depth: defaults::MAX_DEPTH,
            min_samples_leaf: defaults::MIN_SAMPLES_LEAF,
            test_fraction: defaults::TEST_FRACTION,
            seed: defaults::SEED,
        }
    }
}

/// Safety overrides evaluated before any rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub battery_floor_percent: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            battery_floor_percent: defaults::BATTERY_FLOOR_PERCENT,
        }
    }
}

/// The local device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub zone: String,
    pub power_watts: f64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            zone: defaults::LOCAL_ZONE.to_string(),
            power_watts: defaults::LOCAL_POWER_WATTS,
        }
    }
}

/// A remote execution site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateConfig {
    pub name: String,
    /// Base URL of the executor; `/run-task` is appended.
    pub endpoint: String,
    pub zone: String,
    pub power_watts: f64,
}

/// On-disk locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dataset_path: PathBuf,
    pub bundle_db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(defaults::DATASET_PATH),
            bundle_db_path: PathBuf::from(defaults::BUNDLE_DB_PATH),
        }
    }
}

/// Feedback loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Request a retrain after this many appended rows.
    pub retrain_every: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            retrain_every: defaults::RETRAIN_EVERY,
        }
    }
}

/// How tasks are executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub remote_timeout_secs: u64,
    /// Command used to run the task locally.
    pub local_command: Vec<String>,
    /// Working directory for the local command.
    pub local_workdir: PathBuf,
    pub local_timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            remote_timeout_secs: defaults::REMOTE_TIMEOUT_SECS,
            local_command: vec!["python3".to_string(), "train.py".to_string()],
            local_workdir: PathBuf::from("task"),
            local_timeout_secs: defaults::LOCAL_TIMEOUT_SECS,
        }
    }
}

fn default_selection_margins() -> Margins {
    Margins::SELECTION
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub carbon: CarbonConfig,
    /// Margins used to label recorded runs.
    #[serde(default, rename = "margins")]
    pub labeling: Margins,
    /// Margins used to compare remote candidates when no bundle exists.
    #[serde(default = "default_selection_margins")]
    pub selection: Margins,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub candidates: Vec<CandidateConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            carbon: CarbonConfig::default(),
            labeling: Margins::LABELING,
            selection: Margins::SELECTION,
            training: TrainingConfig::default(),
            policy: PolicyConfig::default(),
            local: LocalConfig::default(),
            candidates: Vec::new(),
            storage: StorageConfig::default(),
            feedback: FeedbackConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration (explicit path > `ECOROUTE_CONFIG` > `ecoroute.toml`).
    ///
    /// An explicitly named file must exist; the default file is optional.
    /// Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(env_vars::CONFIG).ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Cannot read {}: {}", path.display(), e))
                })?;
                info!(category = "config", path = %path.display(), "Loading config file");
                Self::from_toml_str(&content)?
            }
            None => match std::fs::read_to_string(defaults::CONFIG_FILE) {
                Ok(content) => {
                    info!(category = "config", path = defaults::CONFIG_FILE, "Loading config file");
                    Self::from_toml_str(&content)?
                }
                Err(_) => {
                    debug!(category = "config", "No config file, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Patch settings from environment variables.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(env_vars::CARBON_API_TOKEN) {
            if !token.is_empty() {
                self.carbon.api_token = Some(token);
            }
        }
        if let Ok(endpoint) = std::env::var(env_vars::CARBON_API_ENDPOINT) {
            self.carbon.api_endpoint = endpoint;
        }
        if let Ok(path) = std::env::var(env_vars::DATASET_PATH) {
            self.storage.dataset_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var(env_vars::BUNDLE_DB) {
            self.storage.bundle_db_path = PathBuf::from(path);
        }
    }

    /// Reject settings no component can work with.
    pub fn validate(&self) -> Result<()> {
        for (name, margins) in [("margins", &self.labeling), ("selection", &self.selection)] {
            if !(margins.carbon_margin > 0.0 && margins.time_margin > 0.0) {
                return Err(Error::Config(format!("[{}] margins must be positive", name)));
            }
        }
        if self.training.max_depth == 0 {
            return Err(Error::Config("training.max_depth must be at least 1".into()));
        }
        if self.training.min_samples_leaf == 0 {
            return Err(Error::Config(
                "training.min_samples_leaf must be at least 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.training.test_fraction) {
            return Err(Error::Config("training.test_fraction must be in [0, 1)".into()));
        }
        if self.local.power_watts < 0.0 || self.candidates.iter().any(|c| c.power_watts < 0.0) {
            return Err(Error::Config("power_watts must not be negative".into()));
        }

        let carbon = &self.carbon;
        let intensities = [
            ("default_intensity", carbon.default_intensity),
            ("high_carbon_fallback", carbon.high_carbon_fallback),
            ("generic_fallback", carbon.generic_fallback),
        ];
        let fixed = carbon
            .fixed_zones
            .iter()
            .map(|(zone, value)| (zone.as_str(), *value));
        for (name, value) in intensities.into_iter().chain(fixed) {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::Config(format!(
                    "carbon intensity for {} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Look up a candidate by name.
    pub fn candidate(&self, name: &str) -> Option<&CandidateConfig> {
        self.candidates.iter().find(|c| c.name == name)
    }
}
