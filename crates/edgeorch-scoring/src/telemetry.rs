//! Telemetry capability and the system-backed sampler.
//!
//! `Telemetry` is the seam the scorer samples through. `SystemTelemetry`
//! reads CPU figures via `sysinfo`, interface queue lengths from sysfs,
//! and measures latency with an HTTP ping.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edgeorch_core::AddressBook;
use parking_lot::Mutex;
use sysinfo::{CpuRefreshKind, RefreshKind, System};
use thiserror::Error;
use tracing::debug;

use crate::probe;

pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("metric unavailable: {0}")]
    Unavailable(String),

    #[error("unknown target device: {0}")]
    UnknownTarget(String),

    #[error("latency probe failed: {0}")]
    Probe(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of raw device metrics. Each call may block on the OS or network.
#[async_trait]
pub trait Telemetry: Send + Sync {
    /// CPU utilization in percent.
    async fn cpu_usage(&self) -> TelemetryResult<f64>;
    async fn cpu_count(&self) -> TelemetryResult<f64>;
    /// CPU frequency in MHz.
    async fn cpu_freq(&self) -> TelemetryResult<f64>;
    async fn network_bandwidth(&self) -> TelemetryResult<f64>;
    /// Round-trip time to `target_device_id`, in seconds.
    async fn round_trip_time(&self, target_device_id: &str) -> TelemetryResult<f64>;

    /// Release monitoring handles.
    fn close(&self) {}
}

/// Interface name fragments counted as physical links.
const LINK_PREFIXES: [&str; 3] = ["eth", "enp", "wl"];

/// Samples the machine this process runs on.
pub struct SystemTelemetry {
    system: Mutex<System>,
    sysfs_net: PathBuf,
    local_id: String,
    local_address: String,
    peers: Arc<dyn AddressBook>,
    probe_timeout: Duration,
}

impl SystemTelemetry {
    /// `peers` resolves remote device IDs; the local device resolves to
    /// `local_address`.
    pub fn new(local_id: String, local_address: String, peers: Arc<dyn AddressBook>) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new().with_cpu(CpuRefreshKind::everything()),
        );
        Self {
            system: Mutex::new(system),
            sysfs_net: PathBuf::from("/sys/class/net"),
            local_id,
            local_address,
            peers,
            probe_timeout: Duration::from_secs(2),
        }
    }

    /// Read interface statistics from another sysfs root.
    pub fn with_sysfs_net(mut self, path: impl Into<PathBuf>) -> Self {
        self.sysfs_net = path.into();
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    fn resolve(&self, device_id: &str) -> Option<String> {
        if device_id == self.local_id {
            Some(self.local_address.clone())
        } else {
            self.peers.address_of(device_id)
        }
    }
}

#[async_trait]
impl Telemetry for SystemTelemetry {
    async fn cpu_usage(&self) -> TelemetryResult<f64> {
        // Usage is a delta between two refreshes.
        self.system.lock().refresh_cpu_usage();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;

        let usage = {
            let mut system = self.system.lock();
            system.refresh_cpu_usage();
            system.global_cpu_usage()
        };

        if usage.is_finite() {
            Ok(f64::from(usage))
        } else {
            Err(TelemetryError::Unavailable("cpu/usage".to_string()))
        }
    }

    async fn cpu_count(&self) -> TelemetryResult<f64> {
        let count = self.system.lock().cpus().len();
        if count == 0 {
            return Err(TelemetryError::Unavailable("cpu/count".to_string()));
        }
        Ok(count as f64)
    }

    async fn cpu_freq(&self) -> TelemetryResult<f64> {
        let freq = {
            let mut system = self.system.lock();
            system.refresh_cpu_frequency();
            system.cpus().first().map(|cpu| cpu.frequency())
        };

        match freq {
            Some(mhz) if mhz > 0 => Ok(mhz as f64),
            _ => Err(TelemetryError::Unavailable("cpu/freq".to_string())),
        }
    }

    async fn network_bandwidth(&self) -> TelemetryResult<f64> {
        mean_tx_queue_len(&self.sysfs_net)
    }

    async fn round_trip_time(&self, target_device_id: &str) -> TelemetryResult<f64> {
        let address = self
            .resolve(target_device_id)
            .ok_or_else(|| TelemetryError::UnknownTarget(target_device_id.to_string()))?;

        let rtt = probe::ping(&address, self.probe_timeout).await?;
        debug!(target = %target_device_id, %address, rtt_ms = rtt.as_millis() as u64, "measured rtt");
        Ok(rtt.as_secs_f64())
    }

    fn close(&self) {
        debug!("system telemetry closed");
    }
}

/// Mean transmit queue length across physical links under `root`.
fn mean_tx_queue_len(root: &Path) -> TelemetryResult<f64> {
    let mut total: u64 = 0;
    let mut count: u64 = 0;

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !LINK_PREFIXES.iter().any(|prefix| name.contains(prefix)) {
            continue;
        }

        let Ok(raw) = std::fs::read_to_string(entry.path().join("tx_queue_len")) else {
            continue;
        };
        if let Ok(len) = raw.trim().parse::<u64>() {
            total += len;
            count += 1;
        }
    }

    if count == 0 {
        return Err(TelemetryError::Unavailable(
            "network/bandwidth: no matching interface".to_string(),
        ));
    }
    Ok(total as f64 / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    struct StaticBook(HashMap<String, String>);

    impl AddressBook for StaticBook {
        fn address_of(&self, device_id: &str) -> Option<String> {
            self.0.get(device_id).cloned()
        }
    }

    fn link(root: &Path, name: &str, qlen: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tx_queue_len"), qlen).unwrap();
    }

    fn telemetry(book: HashMap<String, String>) -> SystemTelemetry {
        SystemTelemetry::new(
            "dev-local".to_string(),
            "127.0.0.1:1".to_string(),
            Arc::new(StaticBook(book)),
        )
    }

    #[test]
    fn bandwidth_averages_physical_links() {
        let root = tempfile::tempdir().unwrap();
        link(root.path(), "eth0", "1000\n");
        link(root.path(), "wlan0", "500\n");
        link(root.path(), "lo", "9999\n");
        link(root.path(), "docker0", "9999\n");

        let bw = mean_tx_queue_len(root.path()).unwrap();
        assert_eq!(bw, 750.0);
    }

    #[test]
    fn bandwidth_without_links_is_unavailable() {
        let root = tempfile::tempdir().unwrap();
        link(root.path(), "lo", "1000");
        assert!(matches!(
            mean_tx_queue_len(root.path()),
            Err(TelemetryError::Unavailable(_))
        ));
    }

    #[test]
    fn bandwidth_skips_unparsable_queue_len() {
        let root = tempfile::tempdir().unwrap();
        link(root.path(), "enp3s0", "garbage");
        link(root.path(), "eth1", "200");
        assert_eq!(mean_tx_queue_len(root.path()).unwrap(), 200.0);
    }

    #[test]
    fn resolves_local_and_peer_addresses() {
        let mut book = HashMap::new();
        book.insert("dev-peer".to_string(), "10.0.0.9:56001".to_string());
        let t = telemetry(book);

        assert_eq!(t.resolve("dev-local").as_deref(), Some("127.0.0.1:1"));
        assert_eq!(t.resolve("dev-peer").as_deref(), Some("10.0.0.9:56001"));
        assert_eq!(t.resolve("dev-ghost"), None);
    }

    #[tokio::test]
    async fn rtt_to_unknown_device_fails() {
        let t = telemetry(HashMap::new());
        let err = t.round_trip_time("dev-ghost").await.unwrap_err();
        assert!(matches!(err, TelemetryError::UnknownTarget(_)));
    }

    #[tokio::test]
    async fn sysfs_override_is_used() {
        let root = tempfile::tempdir().unwrap();
        link(root.path(), "eth0", "64");
        let t = telemetry(HashMap::new()).with_sysfs_net(root.path());
        assert_eq!(t.network_bandwidth().await.unwrap(), 64.0);
    }
}
