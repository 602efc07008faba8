//! Zone classification.

use std::collections::HashMap;

use ecoroute_core::config::CarbonConfig;

/// How a zone's intensity is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneClass {
    /// Fetched from the carbon-data API under the canonical zone code.
    Live { canonical: String },
    /// Pre-set constant, never fetched.
    Fixed(f64),
    /// Unknown zone, answered with the flat default.
    Unclassified,
}

/// Zone codes known to the provider.
#[derive(Debug, Clone)]
pub struct ZoneCatalog {
    /// Zone code or alias -> canonical live zone.
    live: HashMap<String, String>,
    fixed: HashMap<String, f64>,
    default_intensity: f64,
    high_carbon_prefixes: Vec<String>,
    high_carbon_fallback: f64,
    generic_fallback: f64,
}

/// Case-normalize a zone code.
pub fn normalize(zone: &str) -> String {
    zone.trim().to_ascii_uppercase()
}

impl ZoneCatalog {
    pub fn from_config(config: &CarbonConfig) -> Self {
        let mut live = HashMap::new();
        for entry in &config.live_zones {
            let canonical = normalize(&entry.zone);
            for alias in &entry.aliases {
                live.insert(normalize(alias), canonical.clone());
            }
            live.insert(canonical.clone(), canonical);
        }

        Self {
            live,
            fixed: config
                .fixed_zones
                .iter()
                .map(|(zone, value)| (normalize(zone), *value))
                .collect(),
            default_intensity: config.default_intensity,
            high_carbon_prefixes: config
                .high_carbon_prefixes
                .iter()
                .map(|p| normalize(p))
                .collect(),
            high_carbon_fallback: config.high_carbon_fallback,
            generic_fallback: config.generic_fallback,
        }
    }

    /// Classify a zone code. Fixed zones win over live ones so that a fixed
    /// zone can never reach the network.
    pub fn classify(&self, zone: &str) -> ZoneClass {
        let zone = normalize(zone);
        if let Some(value) = self.fixed.get(&zone) {
            return ZoneClass::Fixed(*value);
        }
        match self.live.get(&zone) {
            Some(canonical) => ZoneClass::Live {
                canonical: canonical.clone(),
            },
            None => ZoneClass::Unclassified,
        }
    }

    /// Value returned for unclassified zones.
    pub fn default_intensity(&self) -> f64 {
        self.default_intensity
    }

    /// Deterministic estimate used when a live lookup fails.
    pub fn fallback_for(&self, zone: &str) -> f64 {
        let zone = normalize(zone);
        if self
            .high_carbon_prefixes
            .iter()
            .any(|prefix| zone.starts_with(prefix.as_str()))
        {
            self.high_carbon_fallback
        } else {
            self.generic_fallback
        }
    }
}

impl Default for ZoneCatalog {
    fn default() -> Self {
        Self::from_config(&CarbonConfig::default())
    }
}
