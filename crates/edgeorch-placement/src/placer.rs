//! Placement engine — chooses where one invocation runs.
//!
//! For a service invocation the placer:
//! 1. Checks the requester against the service's allow-list
//! 2. Resolves the approved executable (and screens arguments)
//! 3. Scores the local device and snapshots the peer registry
//! 4. Picks the strictly highest positive score, preferring local on ties

use std::sync::Arc;

use tracing::{debug, info, warn};

use edgeorch_admission::{CommandAdmission, RequesterAdmission};
use edgeorch_core::*;
use edgeorch_registry::PeerRegistry;
use edgeorch_scoring::ResourceScorer;

/// One device competing for an invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub device_id: DeviceId,
    pub address: String,
    pub score: f64,
}

impl Candidate {
    fn eligible(&self) -> bool {
        self.score.is_finite() && self.score > 0.0
    }
}

/// Pick the target among the local device and `peers`.
///
/// Zero-scored devices and registry entries carrying the local device ID
/// never compete. A peer must beat the current best strictly, so the local
/// device wins ties and otherwise the first peer in snapshot order does.
pub fn select_target(local: &Candidate, peers: &[PeerEntry]) -> Option<PlacementDecision> {
    let mut best: Option<(&str, &str, f64, bool)> = None;

    if local.eligible() {
        best = Some((local.device_id.as_str(), local.address.as_str(), local.score, true));
    }

    for peer in peers {
        if peer.device_id == local.device_id {
            debug!(device_id = %peer.device_id, "skipping registry entry for self");
            continue;
        }
        if !peer.latest_score.is_usable() {
            continue;
        }
        let score = peer.latest_score.score;
        if best.is_none_or(|(_, _, best_score, _)| score > best_score) {
            best = Some((peer.device_id.as_str(), peer.address.as_str(), score, false));
        }
    }

    best.map(|(device_id, address, _, is_local)| PlacementDecision {
        target_device_id: device_id.to_string(),
        target_address: address.to_string(),
        is_local,
    })
}

/// Wires admission, scoring and the registry into placement decisions.
pub struct Placer {
    local_id: DeviceId,
    local_address: String,
    requesters: Arc<RequesterAdmission>,
    commands: Arc<CommandAdmission>,
    registry: Arc<PeerRegistry>,
    scorer: Arc<ResourceScorer>,
}

impl Placer {
    pub fn new(
        local_id: DeviceId,
        local_address: String,
        requesters: Arc<RequesterAdmission>,
        commands: Arc<CommandAdmission>,
        registry: Arc<PeerRegistry>,
        scorer: Arc<ResourceScorer>,
    ) -> Self {
        Self {
            local_id,
            local_address,
            requesters,
            commands,
            registry,
            scorer,
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Run admission for an invocation. Returns the approved executable.
    pub fn admit(&self, service: &str, requester: &str, args: &[String]) -> EngineResult<String> {
        self.requesters.check(service, requester)?;
        let executable = self.commands.resolve(service)?;
        self.commands.check_args(args)?;
        Ok(executable)
    }

    /// Admission without argument screening, then target selection.
    pub async fn place(&self, service: &str, requester: &str) -> EngineResult<PlacementDecision> {
        self.requesters.check(service, requester)?;
        self.commands.resolve(service)?;
        self.decide(service).await
    }

    /// Score the local device, snapshot peers and select a target.
    ///
    /// Assumes admission has already passed.
    pub async fn decide(&self, service: &str) -> EngineResult<PlacementDecision> {
        let local = Candidate {
            device_id: self.local_id.clone(),
            address: self.local_address.clone(),
            score: self.scorer.score(&self.local_id).await,
        };
        let peers = self.registry.snapshot();

        match select_target(&local, &peers) {
            Some(decision) => {
                info!(
                    %service,
                    target = %decision.target_device_id,
                    is_local = decision.is_local,
                    local_score = local.score,
                    peers = peers.len(),
                    "placement decided"
                );
                Ok(decision)
            }
            None => {
                warn!(%service, peers = peers.len(), "no device with a usable score");
                Err(EngineError::NoEligibleTarget(service.to_string()))
            }
        }
    }
}
