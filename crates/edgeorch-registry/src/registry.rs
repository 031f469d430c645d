//! Peer registry — the latest known score for every peer device.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::{debug, info};

use edgeorch_core::*;

use crate::exchange::PeerEvents;

/// Process-wide table of peer devices, guarded by one exclusive lock.
///
/// Updates overwrite by arrival order (no timestamp comparison), so a
/// delayed announcement can replace a fresher score. Snapshots iterate in
/// lexical device-ID order.
#[derive(Default)]
pub struct PeerRegistry {
    peers: Mutex<BTreeMap<DeviceId, PeerEntry>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `score` for `device_id`, replacing whatever was there.
    ///
    /// `registered_at` is kept from the first update of the device.
    pub fn update(&self, device_id: &str, address: &str, score: DeviceScore) {
        let mut peers = self.peers.lock();
        match peers.get_mut(device_id) {
            Some(entry) => {
                entry.address = address.to_string();
                entry.latest_score = score;
            }
            None => {
                info!(%device_id, %address, score = score.score, "peer registered");
                peers.insert(
                    device_id.to_string(),
                    PeerEntry {
                        device_id: device_id.to_string(),
                        address: address.to_string(),
                        latest_score: score,
                        registered_at: epoch_millis(),
                    },
                );
            }
        }
    }

    /// Drop a peer. Returns whether it was present.
    pub fn remove(&self, device_id: &str) -> bool {
        let existed = self.peers.lock().remove(device_id).is_some();
        if existed {
            info!(%device_id, "peer removed");
        } else {
            debug!(%device_id, "remove for unknown peer");
        }
        existed
    }

    /// Copy of every entry, ordered by device ID.
    pub fn snapshot(&self) -> Vec<PeerEntry> {
        self.peers.lock().values().cloned().collect()
    }

    pub fn get(&self, device_id: &str) -> Option<PeerEntry> {
        self.peers.lock().get(device_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }
}

impl AddressBook for PeerRegistry {
    fn address_of(&self, device_id: &str) -> Option<String> {
        self.peers.lock().get(device_id).map(|p| p.address.clone())
    }
}

impl PeerEvents for PeerRegistry {
    fn on_peer_update(&self, announcement: &Announcement) {
        self.update(
            &announcement.device_id,
            &announcement.address,
            announcement.score.clone(),
        );
    }

    fn on_peer_expire(&self, device_id: &str) {
        self.remove(device_id);
    }
}
