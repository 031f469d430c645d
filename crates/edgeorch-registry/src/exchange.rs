//! Score exchange — periodic self-score publication and peer liveness.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use edgeorch_core::{Announcement, DeviceId, DeviceScore};
use edgeorch_scoring::ResourceScorer;

/// Hooks the discovery transport calls when peers change.
///
/// Called while the transport holds its own peer clock locked, so an
/// implementation must not call back into the transport.
pub trait PeerEvents: Send + Sync {
    fn on_peer_update(&self, announcement: &Announcement);
    fn on_peer_expire(&self, device_id: &str);
}

/// Propagates scores between devices and tracks who is still alive.
#[async_trait]
pub trait DiscoveryTransport: Send + Sync {
    /// Make the local score visible to peers.
    async fn publish(&self, score: &DeviceScore) -> anyhow::Result<()>;

    /// Expire peers silent for longer than `window`, firing
    /// `on_peer_expire` for each. Returns the expired IDs.
    fn expire(&self, window: Duration) -> Vec<DeviceId>;
}

/// Background task that scores this device and publishes the result.
pub struct ScoreExchange {
    device_id: DeviceId,
    scorer: Arc<ResourceScorer>,
    transport: Arc<dyn DiscoveryTransport>,
    interval: Duration,
    liveness_window: Duration,
}

impl ScoreExchange {
    pub fn new(
        device_id: DeviceId,
        scorer: Arc<ResourceScorer>,
        transport: Arc<dyn DiscoveryTransport>,
    ) -> Self {
        Self {
            device_id,
            scorer,
            transport,
            interval: Duration::from_secs(5),
            liveness_window: Duration::from_secs(30),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_liveness_window(mut self, window: Duration) -> Self {
        self.liveness_window = window;
        self
    }

    /// Hand `score` to the transport. Failures are logged, not returned.
    pub async fn publish(&self, score: &DeviceScore) {
        match self.transport.publish(score).await {
            Ok(()) => debug!(device_id = %score.device_id, score = score.score, "score published"),
            Err(e) => warn!(device_id = %score.device_id, error = %e, "score publication failed"),
        }
    }

    /// Score this device and publish the result. Returns the score.
    ///
    /// A zero score is published too, so peers stop placing work here
    /// without waiting for the liveness window.
    pub async fn publish_once(&self) -> f64 {
        let value = self.scorer.score(&self.device_id).await;
        let score = DeviceScore::now(self.device_id.clone(), value);

        if !score.is_usable() {
            debug!(device_id = %self.device_id, "local score unavailable, publishing zero");
        }
        self.publish(&score).await;
        value
    }

    /// One exchange round: publish, then expire silent peers.
    pub async fn tick(&self) {
        self.publish_once().await;
        let expired = self.transport.expire(self.liveness_window);
        if !expired.is_empty() {
            info!(count = expired.len(), "expired silent peers");
        }
    }

    /// Run until `shutdown` flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            device_id = %self.device_id,
            interval = ?self.interval,
            liveness_window = ?self.liveness_window,
            "score exchange started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    info!("score exchange shutting down");
                    break;
                }
            }
        }
    }
}
