//! Domain types shared across EdgeOrch crates.
//!
//! Scores, peer entries and placement decisions are plain serializable
//! values. Tables that own them cross-reference each other by device ID
//! or service name, never by pointer.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Opaque identifier for a device on the edge network.
pub type DeviceId = String;

/// Name under which a service is registered and invoked.
pub type ServiceName = String;

// ── Scores ─────────────────────────────────────────────────────────

/// A fitness score observed for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceScore {
    pub device_id: DeviceId,
    /// Fitness, higher is better. Zero means "unavailable".
    pub score: f64,
    /// Unix timestamp (milliseconds) when the score was sampled.
    pub observed_at: u64,
}

impl DeviceScore {
    /// Build a score stamped with the current time.
    pub fn now(device_id: impl Into<DeviceId>, score: f64) -> Self {
        Self {
            device_id: device_id.into(),
            score,
            observed_at: epoch_millis(),
        }
    }

    /// Whether this score makes its device a placement candidate.
    pub fn is_usable(&self) -> bool {
        self.score.is_finite() && self.score > 0.0
    }
}

// ── Peers ──────────────────────────────────────────────────────────

/// Registry view of a peer device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub device_id: DeviceId,
    /// `host:port` of the peer's REST endpoint.
    pub address: String,
    pub latest_score: DeviceScore,
    /// Unix timestamp (milliseconds) of the first update for this device.
    pub registered_at: u64,
}

/// Record exchanged by the discovery transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub device_id: DeviceId,
    pub address: String,
    pub score: DeviceScore,
}

/// Resolves a device ID to its network address.
pub trait AddressBook: Send + Sync {
    fn address_of(&self, device_id: &str) -> Option<String>;
}

// ── Services ───────────────────────────────────────────────────────

/// The approved executable for a service name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    pub service_name: ServiceName,
    pub executable_name: String,
}

/// The callers allowed to invoke a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterRecord {
    pub service_name: ServiceName,
    pub allowed_requesters: Vec<String>,
}

/// A service as described on disk or posted to the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub service_name: ServiceName,
    pub executable: String,
    #[serde(default)]
    pub allowed_requesters: Vec<String>,
}

// ── Placement ──────────────────────────────────────────────────────

/// Where a single invocation will run. Never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementDecision {
    pub target_device_id: DeviceId,
    pub target_address: String,
    pub is_local: bool,
}

// ── Invocation ─────────────────────────────────────────────────────

/// Inbound request to run a service somewhere on the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub service_name: ServiceName,
    pub requester: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Upper bound for a remote dispatch, overriding the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// What came back from running a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    /// Process exit code; `None` if terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Result of a successful invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub service_name: ServiceName,
    pub target_device_id: DeviceId,
    pub is_local: bool,
    pub output: ExecutionOutput,
}

/// Payload forwarded to a peer when placement picks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteExecution {
    pub service_name: ServiceName,
    pub requester: String,
    pub executable: String,
    pub args: Vec<String>,
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
