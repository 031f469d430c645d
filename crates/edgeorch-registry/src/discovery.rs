//! Static-seed HTTP discovery.
//!
//! Each device POSTs its `Announcement` to every configured seed. The
//! receiving side hands inbound announcements to [`HttpDiscovery::observe`],
//! which keeps a last-seen clock per peer and forwards the update to the
//! registry. Peers that stop announcing are expired by the exchange loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use edgeorch_core::{Announcement, DeviceId, DeviceScore};

use crate::exchange::{DiscoveryTransport, PeerEvents};

/// Path seeds accept announcements on.
pub const ANNOUNCE_PATH: &str = "/api/v1/peers/announce";

pub struct HttpDiscovery {
    local_id: DeviceId,
    local_address: String,
    seeds: Vec<String>,
    events: Arc<dyn PeerEvents>,
    last_seen: Mutex<HashMap<DeviceId, Instant>>,
    timeout: Duration,
}

impl HttpDiscovery {
    pub fn new(
        local_id: DeviceId,
        local_address: String,
        seeds: Vec<String>,
        events: Arc<dyn PeerEvents>,
    ) -> Self {
        Self {
            local_id,
            local_address,
            seeds,
            events,
            last_seen: Mutex::new(HashMap::new()),
            timeout: Duration::from_secs(2),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn seeds(&self) -> &[String] {
        &self.seeds
    }

    /// Record an inbound announcement. Returns `false` for our own.
    ///
    /// Zero scores are still recorded: they keep the peer alive while
    /// placement skips it.
    pub fn observe(&self, announcement: &Announcement) -> bool {
        if announcement.device_id == self.local_id {
            debug!(device_id = %announcement.device_id, "ignoring own announcement");
            return false;
        }

        // Clock and registry change together; see `expire`.
        let mut last_seen = self.last_seen.lock();
        last_seen.insert(announcement.device_id.clone(), Instant::now());
        self.events.on_peer_update(announcement);
        drop(last_seen);

        debug!(
            device_id = %announcement.device_id,
            address = %announcement.address,
            score = announcement.score.score,
            "announcement observed"
        );
        true
    }

    /// Number of peers currently tracked as alive.
    pub fn tracked(&self) -> usize {
        self.last_seen.lock().len()
    }

    async fn announce_to(&self, seed: &str, body: Bytes) -> anyhow::Result<()> {
        tokio::time::timeout(self.timeout, post_json(seed, ANNOUNCE_PATH, body))
            .await
            .with_context(|| format!("announce to {seed} timed out"))?
    }
}

#[async_trait]
impl DiscoveryTransport for HttpDiscovery {
    async fn publish(&self, score: &DeviceScore) -> anyhow::Result<()> {
        let announcement = Announcement {
            device_id: self.local_id.clone(),
            address: self.local_address.clone(),
            score: score.clone(),
        };
        let body = Bytes::from(serde_json::to_vec(&announcement)?);

        let mut failed = 0usize;
        for seed in &self.seeds {
            if let Err(e) = self.announce_to(seed, body.clone()).await {
                warn!(%seed, error = %e, "announcement not delivered");
                failed += 1;
            }
        }

        if failed > 0 && failed == self.seeds.len() {
            anyhow::bail!("no seed accepted the announcement ({failed} tried)");
        }
        Ok(())
    }

    fn expire(&self, window: Duration) -> Vec<DeviceId> {
        let mut last_seen = self.last_seen.lock();
        let expired: Vec<DeviceId> = last_seen
            .iter()
            .filter(|(_, seen)| seen.elapsed() > window)
            .map(|(id, _)| id.clone())
            .collect();

        // Registry removal happens under the same lock as the clock removal.
        for id in &expired {
            last_seen.remove(id);
            self.events.on_peer_expire(id);
            info!(device_id = %id, ?window, "peer expired");
        }
        expired
    }
}

/// POST a JSON body to `http://{address}{path}` and require a 2xx answer.
async fn post_json(address: &str, path: &str, body: Bytes) -> anyhow::Result<()> {
    let stream = tokio::net::TcpStream::connect(address)
        .await
        .with_context(|| format!("connect {address}"))?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .context("http handshake")?;
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method("POST")
        .uri(format!("http://{address}{path}"))
        .header("host", address)
        .header("content-type", "application/json")
        .body(Full::new(body))?;

    let resp = sender.send_request(req).await.context("send announcement")?;
    if !resp.status().is_success() {
        anyhow::bail!("seed answered {}", resp.status());
    }
    Ok(())
}
