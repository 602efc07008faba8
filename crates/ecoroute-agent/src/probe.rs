//! Device and network feature collection.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ecoroute_core::FeatureVector;
use tracing::debug;

/// RTT reported when the network probe fails.
pub const RTT_UNREACHABLE_MS: f64 = 9999.0;

/// Source of the current feature vector.
#[async_trait]
pub trait FeatureProbe: Send + Sync {
    /// Collect features for a task whose archive is `input_size_bytes` long.
    async fn collect(&self, input_size_bytes: u64) -> FeatureVector;
}

/// Returns a fixed vector. Used by tests and by the CLI when features are
/// given on the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    features: FeatureVector,
}

impl StaticProbe {
    pub fn new(features: FeatureVector) -> Self {
        Self { features }
    }
}

#[async_trait]
impl FeatureProbe for StaticProbe {
    async fn collect(&self, input_size_bytes: u64) -> FeatureVector {
        FeatureVector {
            input_size_bytes,
            ..self.features
        }
    }
}

/// Battery reading from the power-supply interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryState {
    pub percent: f64,
    pub charging: bool,
}

/// Reads features from the running system.
pub struct SystemProbe {
    rtt_target: SocketAddr,
    rtt_timeout: Duration,
    cpu_sample: Duration,
    power_supply_dir: PathBuf,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            rtt_target: SocketAddr::from(([8, 8, 8, 8], 53)),
            rtt_timeout: Duration::from_secs(1),
            cpu_sample: Duration::from_millis(300),
            power_supply_dir: PathBuf::from("/sys/class/power_supply"),
        }
    }

    /// Measure RTT with a TCP connect to this address.
    pub fn with_rtt_target(mut self, target: SocketAddr) -> Self {
        self.rtt_target = target;
        self
    }

    pub fn with_rtt_timeout(mut self, timeout: Duration) -> Self {
        self.rtt_timeout = timeout;
        self
    }

    pub fn with_cpu_sample(mut self, sample: Duration) -> Self {
        self.cpu_sample = sample;
        self
    }

    pub fn with_power_supply_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.power_supply_dir = dir.into();
        self
    }

    /// TCP connect time in milliseconds, [`RTT_UNREACHABLE_MS`] on failure.
    pub async fn measure_rtt(&self) -> f64 {
        let started = Instant::now();
        match tokio::time::timeout(
            self.rtt_timeout,
            tokio::net::TcpStream::connect(self.rtt_target),
        )
        .await
        {
            Ok(Ok(_stream)) => started.elapsed().as_secs_f64() * 1000.0,
            Ok(Err(e)) => {
                debug!(category = "probe", target = %self.rtt_target, error = %e, "RTT probe failed");
                RTT_UNREACHABLE_MS
            }
            Err(_) => {
                debug!(category = "probe", target = %self.rtt_target, "RTT probe timed out");
                RTT_UNREACHABLE_MS
            }
        }
    }

    /// Global CPU utilisation over the sample window.
    pub async fn measure_cpu(&self) -> f64 {
        let sample = self.cpu_sample.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        tokio::task::spawn_blocking(move || {
            let mut sys = sysinfo::System::new();
            sys.refresh_cpu_usage();
            std::thread::sleep(sample);
            sys.refresh_cpu_usage();
            f64::from(sys.global_cpu_usage())
        })
        .await
        .unwrap_or(0.0)
    }

    /// First battery found under the power-supply directory.
    pub fn read_battery(&self) -> Option<BatteryState> {
        read_battery(&self.power_supply_dir)
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn read_battery(dir: &Path) -> Option<BatteryState> {
    let mut supplies: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    supplies.sort();

    supplies.into_iter().find_map(|supply| {
        let kind = std::fs::read_to_string(supply.join("type")).ok()?;
        if kind.trim() != "Battery" {
            return None;
        }
        let percent = std::fs::read_to_string(supply.join("capacity"))
            .ok()?
            .trim()
            .parse::<f64>()
            .ok()?;
        let status = std::fs::read_to_string(supply.join("status")).unwrap_or_default();
        Some(BatteryState {
            percent,
            charging: status.trim() != "Discharging",
        })
    })
}

#[async_trait]
impl FeatureProbe for SystemProbe {
    async fn collect(&self, input_size_bytes: u64) -> FeatureVector {
        let (rtt_ms, cpu_percent) = tokio::join!(self.measure_rtt(), self.measure_cpu());
        let battery = self.read_battery();

        let features = FeatureVector {
            input_size_bytes,
            rtt_ms,
            cpu_percent,
            battery_percent: battery.map(|b| b.percent),
            is_charging: battery.map(|b| b.charging),
            gpu_available: false,
        };
        debug!(category = "probe", features = ?features, "Features collected");
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_supply(root: &Path, name: &str, kind: &str, files: &[(&str, &str)]) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("type"), format!("{}\n", kind)).unwrap();
        for (file, content) in files {
            std::fs::write(dir.join(file), format!("{}\n", content)).unwrap();
        }
    }

    #[test]
    fn test_battery_read_from_power_supply() {
        let root = tempfile::tempdir().unwrap();
        write_supply(root.path(), "AC", "Mains", &[("online", "0")]);
        write_supply(
            root.path(),
            "BAT0",
            "Battery",
            &[("capacity", "4"), ("status", "Discharging")],
        );

        assert_eq!(
            read_battery(root.path()),
            Some(BatteryState {
                percent: 4.0,
                charging: false
            })
        );
    }

    #[test]
    fn test_no_battery() {
        let root = tempfile::tempdir().unwrap();
        write_supply(root.path(), "AC", "Mains", &[("online", "1")]);
        assert_eq!(read_battery(root.path()), None);
        assert_eq!(read_battery(&root.path().join("missing")), None);
    }

    #[tokio::test]
    async fn test_rtt_against_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let probe = SystemProbe::new().with_rtt_target(listener.local_addr().unwrap());
        let rtt = probe.measure_rtt().await;
        assert!(rtt < RTT_UNREACHABLE_MS);
    }

    #[tokio::test]
    async fn test_rtt_failure_reports_sentinel() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let probe = SystemProbe::new()
            .with_rtt_target(addr)
            .with_rtt_timeout(Duration::from_millis(200));
        assert_eq!(probe.measure_rtt().await, RTT_UNREACHABLE_MS);
    }

    #[tokio::test]
    async fn test_static_probe_sets_input_size() {
        let probe = StaticProbe::new(FeatureVector {
            rtt_ms: 42.0,
            ..Default::default()
        });
        let features = probe.collect(8192).await;
        assert_eq!(features.input_size_bytes, 8192);
        assert_eq!(features.rtt_ms, 42.0);
    }
}
