//! Engine construction from config or from explicit capabilities.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use edgeorch_admission::{CommandAdmission, RequesterAdmission};
use edgeorch_core::{DeviceId, EngineConfig};
use edgeorch_dispatch::{Cipher, Dispatcher, Executor, HttpTransport, ProcessExecutor, SecureTransport};
use edgeorch_placement::Placer;
use edgeorch_registry::{HttpDiscovery, PeerRegistry};
use edgeorch_scoring::{ResourceScorer, SystemTelemetry, Telemetry};

use crate::engine::DecisionEngine;

/// Assembles a [`DecisionEngine`]. Unset capabilities default to the
/// system ones: sysinfo telemetry, process executor, HTTP transport.
pub struct EngineBuilder {
    device_id: DeviceId,
    address: String,
    telemetry: Option<Arc<dyn Telemetry>>,
    executor: Option<Arc<dyn Executor>>,
    transport: Option<Arc<dyn SecureTransport>>,
    cipher: Cipher,
    dispatch_timeout: Duration,
    seeds: Vec<String>,
}

impl EngineBuilder {
    pub fn new(device_id: impl Into<DeviceId>, address: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            address: address.into(),
            telemetry: None,
            executor: None,
            transport: None,
            cipher: Cipher::PassThrough,
            dispatch_timeout: Duration::from_secs(10),
            seeds: Vec::new(),
        }
    }

    /// Builder preloaded from `edgeorch.toml` settings, including the cipher
    /// key file.
    pub fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        let cipher = Cipher::from_config(config.dispatch.cipher, config.dispatch.key_file.as_deref())
            .context("failed to set up dispatch cipher")?;

        Ok(Self::new(config.device_id(), config.advertise_address())
            .cipher(cipher)
            .dispatch_timeout(config.dispatch_timeout())
            .seeds(config.exchange.peers.clone()))
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn SecureTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn cipher(mut self, cipher: Cipher) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    pub fn seeds(mut self, seeds: Vec<String>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn build(self) -> DecisionEngine {
        let registry = Arc::new(PeerRegistry::new());
        let requesters = Arc::new(RequesterAdmission::new());
        let commands = Arc::new(CommandAdmission::new());

        let telemetry = self.telemetry.unwrap_or_else(|| {
            Arc::new(SystemTelemetry::new(
                self.device_id.clone(),
                self.address.clone(),
                registry.clone(),
            ))
        });
        let scorer = Arc::new(ResourceScorer::new(telemetry));

        let discovery = Arc::new(HttpDiscovery::new(
            self.device_id.clone(),
            self.address.clone(),
            self.seeds,
            registry.clone(),
        ));

        let placer = Placer::new(
            self.device_id.clone(),
            self.address.clone(),
            requesters.clone(),
            commands.clone(),
            registry.clone(),
            scorer.clone(),
        );

        let dispatcher = Dispatcher::new(
            self.executor.unwrap_or_else(|| Arc::new(ProcessExecutor)),
            self.transport.unwrap_or_else(|| Arc::new(HttpTransport)),
            Arc::new(self.cipher),
            self.dispatch_timeout,
        );

        info!(
            device_id = %self.device_id,
            address = %self.address,
            seeds = discovery.seeds().len(),
            cipher = ?dispatcher.cipher().kind(),
            "decision engine built"
        );

        DecisionEngine {
            device_id: self.device_id,
            address: self.address,
            requesters,
            commands,
            registry,
            scorer,
            discovery,
            placer,
            dispatcher,
        }
    }
}
