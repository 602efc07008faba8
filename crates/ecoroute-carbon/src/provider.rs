//! Cached, fallback-safe carbon-intensity provider.
//!
//! `intensity(zone)` always returns a value:
//!
//! - fixed zones return their constant without touching cache or network
//! - unclassified zones return the flat default
//! - live zones are served from cache within the TTL; on a miss one request
//!   is issued, and any failure is replaced by a deterministic fallback that
//!   is cached under the same TTL
//!
//! Each live zone has its own cache slot. A slot stays locked while its
//! zone is fetched, so concurrent misses on one zone trigger exactly one
//! request while other zones are served independently.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ecoroute_core::config::CarbonConfig;
use ecoroute_core::Error;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::{CarbonFetcher, ElectricityMapsClient};
use crate::zones::{ZoneCatalog, ZoneClass, normalize};

/// Where a carbon-intensity value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarbonSource {
    /// Fetched from the carbon-data API.
    Live,
    /// Pre-set constant for the zone.
    Fixed,
    /// Conservative estimate: failed lookup or unclassified zone.
    Fallback,
}

impl fmt::Display for CarbonSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CarbonSource::Live => f.write_str("live"),
            CarbonSource::Fixed => f.write_str("fixed"),
            CarbonSource::Fallback => f.write_str("fallback"),
        }
    }
}

/// A carbon-intensity reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonSample {
    /// Normalized zone code (canonical code for live zones).
    pub zone: String,
    /// gCO2/kWh, never negative.
    pub value: f64,
    pub source: CarbonSource,
    pub fetched_at: DateTime<Utc>,
}

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Requests actually sent to the fetcher.
    pub fetches: u64,
    /// Misses answered with a fallback value.
    pub fallbacks: u64,
    pub entries: usize,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    sample: CarbonSample,
    stored_at: Instant,
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    fallbacks: AtomicU64,
}

/// Resolves zone codes to carbon intensity.
pub struct CarbonIntensityProvider {
    catalog: ZoneCatalog,
    fetcher: Arc<dyn CarbonFetcher>,
    cache: Mutex<HashMap<String, Slot>>,
    ttl: Duration,
    counters: Counters,
}

impl CarbonIntensityProvider {
    /// Create a provider with the default 600s TTL.
    pub fn new(catalog: ZoneCatalog, fetcher: Arc<dyn CarbonFetcher>) -> Self {
        Self {
            catalog,
            fetcher,
            cache: Mutex::new(HashMap::new()),
            ttl: Duration::from_secs(ecoroute_core::config::defaults::CACHE_TTL_SECS),
            counters: Counters::default(),
        }
    }

    /// Build a provider backed by the live API client.
    pub fn from_config(config: &CarbonConfig) -> Result<Self, Error> {
        let client = ElectricityMapsClient::from_config(config)?;
        Ok(Self::new(ZoneCatalog::from_config(config), Arc::new(client))
            .with_ttl(Duration::from_secs(config.cache_ttl_secs)))
    }

    /// Set the cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn catalog(&self) -> &ZoneCatalog {
        &self.catalog
    }

    /// Carbon intensity for a zone. Never fails.
    pub async fn intensity(&self, zone: &str) -> CarbonSample {
        match self.catalog.classify(zone) {
            ZoneClass::Fixed(value) => {
                debug!(category = "carbon", zone = %normalize(zone), value, "Fixed zone");
                CarbonSample {
                    zone: normalize(zone),
                    value,
                    source: CarbonSource::Fixed,
                    fetched_at: Utc::now(),
                }
            }
            ZoneClass::Unclassified => {
                let value = self.catalog.default_intensity();
                debug!(category = "carbon", zone = %normalize(zone), value, "Unclassified zone, using default");
                CarbonSample {
                    zone: normalize(zone),
                    value,
                    source: CarbonSource::Fallback,
                    fetched_at: Utc::now(),
                }
            }
            ZoneClass::Live { canonical } => self.live_intensity(canonical).await,
        }
    }

    async fn live_intensity(&self, zone: String) -> CarbonSample {
        let slot = self.cache.lock().await.entry(zone.clone()).or_default().clone();
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.stored_at.elapsed() < self.ttl {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(category = "carbon", zone = %zone, value = cached.sample.value, "Cache hit");
                return cached.sample.clone();
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);

        let sample = match self.fetcher.fetch(&zone).await {
            Ok(value) => {
                info!(category = "carbon", zone = %zone, value, "Carbon intensity fetched");
                CarbonSample {
                    zone: zone.clone(),
                    value,
                    source: CarbonSource::Live,
                    fetched_at: Utc::now(),
                }
            }
            Err(failure) => {
                let value = self.catalog.fallback_for(&zone);
                self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
                warn!(category = "carbon", zone = %zone, error = %failure, value, "Lookup failed, using fallback");
                CarbonSample {
                    zone: zone.clone(),
                    value,
                    source: CarbonSource::Fallback,
                    fetched_at: Utc::now(),
                }
            }
        };

        *entry = Some(CacheEntry {
            sample: sample.clone(),
            stored_at: Instant::now(),
        });
        sample
    }

    /// Drop the cached value for a zone. Returns true if one was cached.
    pub async fn invalidate(&self, zone: &str) -> bool {
        let key = match self.catalog.classify(zone) {
            ZoneClass::Live { canonical } => canonical,
            _ => return false,
        };
        let slot = self.cache.lock().await.get(&key).cloned();
        match slot {
            Some(slot) => slot.lock().await.take().is_some(),
            None => false,
        }
    }

    /// Drop all cached values.
    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let slots: Vec<Slot> = self.cache.lock().await.values().cloned().collect();
        let mut entries = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                entries += 1;
            }
        }

        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            fallbacks: self.counters.fallbacks.load(Ordering::Relaxed),
            entries,
        }
    }
}
