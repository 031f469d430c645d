//! edgeorch.toml configuration parser and service descriptor loader.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::types::ServiceDescriptor;

/// Port the REST endpoint listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 56001;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub device: DeviceConfig,
    pub exchange: ExchangeConfig,
    pub dispatch: DispatchConfig,
    pub services: ServicesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Stable device identity. Derived from the hostname when absent.
    pub id: Option<String>,
    pub listen_port: u16,
    /// `host:port` peers use to reach this device.
    pub advertise_address: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: None,
            listen_port: DEFAULT_PORT,
            advertise_address: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub publish_interval: String,
    pub liveness_window: String,
    /// Seed peers (`host:port`) that receive our score announcements.
    pub peers: Vec<String>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            publish_interval: "5s".to_string(),
            liveness_window: "30s".to_string(),
            peers: Vec::new(),
        }
    }
}

/// Transport cipher, chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CipherKind {
    /// Payloads travel as-is. Trusted networks only.
    #[default]
    PassThrough,
    /// AES-256-GCM keyed by the SHA-256 of a shared passphrase.
    AuthenticatedHash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub timeout: String,
    pub cipher: CipherKind,
    pub key_file: Option<PathBuf>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: "10s".to_string(),
            cipher: CipherKind::PassThrough,
            key_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Directory of `*.toml` service descriptors.
    pub dir: Option<PathBuf>,
    pub reload_interval: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            dir: None,
            reload_interval: "10s".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject duration fields that `parse_duration` cannot read.
    pub fn validate(&self) -> anyhow::Result<()> {
        let durations = [
            ("exchange.publish_interval", &self.exchange.publish_interval),
            ("exchange.liveness_window", &self.exchange.liveness_window),
            ("dispatch.timeout", &self.dispatch.timeout),
            ("services.reload_interval", &self.services.reload_interval),
        ];
        for (field, value) in durations {
            if parse_duration(value).is_none() {
                anyhow::bail!("invalid duration for {field}: {value:?}");
            }
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// This device's ID: configured, or derived from the hostname.
    pub fn device_id(&self) -> String {
        match &self.device.id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => derive_device_id(&hostname()),
        }
    }

    /// Address advertised to peers, defaulting to loopback on the listen port.
    pub fn advertise_address(&self) -> String {
        self.device
            .advertise_address
            .clone()
            .unwrap_or_else(|| format!("127.0.0.1:{}", self.device.listen_port))
    }

    pub fn publish_interval(&self) -> Duration {
        parse_duration(&self.exchange.publish_interval).unwrap_or(Duration::from_secs(5))
    }

    pub fn liveness_window(&self) -> Duration {
        parse_duration(&self.exchange.liveness_window).unwrap_or(Duration::from_secs(30))
    }

    pub fn dispatch_timeout(&self) -> Duration {
        parse_duration(&self.dispatch.timeout).unwrap_or(Duration::from_secs(10))
    }

    pub fn reload_interval(&self) -> Duration {
        parse_duration(&self.services.reload_interval).unwrap_or(Duration::from_secs(10))
    }
}

/// Parse a duration string like "5s", "500ms", "1m", or bare seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Load every `*.toml` service descriptor under `dir`.
///
/// Files that fail to read or parse are logged and skipped. A missing
/// directory yields an empty list.
pub fn load_service_dir(dir: &Path) -> anyhow::Result<Vec<ServiceDescriptor>> {
    if !dir.exists() {
        debug!(dir = ?dir, "service descriptor directory does not exist");
        return Ok(Vec::new());
    }

    let mut descriptors = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "toml") {
            continue;
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| toml::from_str::<ServiceDescriptor>(&content).map_err(Into::into));

        match parsed {
            Ok(desc) => {
                debug!(path = ?path, service = %desc.service_name, "loaded service descriptor");
                descriptors.push(desc);
            }
            Err(e) => warn!(path = ?path, error = %e, "skipping invalid service descriptor"),
        }
    }

    Ok(descriptors)
}

fn derive_device_id(hostname: &str) -> String {
    let digest = Sha256::digest(hostname.as_bytes());
    format!("device-{}", hex::encode(&digest[..8]))
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
        })
        .unwrap_or_else(|| "localhost".to_string())
}
