//! Service descriptor hot reload.
//!
//! Rescans the descriptor directory on an interval and applies every
//! descriptor that is new or changed since the last scan. Removing a file
//! does not unregister its service.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use edgeorch_core::{ServiceDescriptor, ServiceName, load_service_dir};

use crate::engine::DecisionEngine;

pub struct DescriptorReloader {
    engine: Arc<DecisionEngine>,
    dir: PathBuf,
    interval: Duration,
    applied: HashMap<ServiceName, ServiceDescriptor>,
}

impl DescriptorReloader {
    pub fn new(engine: Arc<DecisionEngine>, dir: PathBuf, interval: Duration) -> Self {
        Self {
            engine,
            dir,
            interval,
            applied: HashMap::new(),
        }
    }

    /// Scan once. Returns how many descriptors were applied.
    pub fn reload_once(&mut self) -> anyhow::Result<usize> {
        let descriptors = load_service_dir(&self.dir)?;
        let mut applied = 0;

        for desc in descriptors {
            if self.applied.get(&desc.service_name) == Some(&desc) {
                continue;
            }
            match self.engine.apply_descriptor(&desc) {
                Ok(()) => {
                    applied += 1;
                    self.applied.insert(desc.service_name.clone(), desc);
                }
                Err(e) => warn!(
                    service = %desc.service_name,
                    executable = %desc.executable,
                    kind = e.kind(),
                    error = %e,
                    "service descriptor rejected"
                ),
            }
        }

        if applied > 0 {
            info!(dir = ?self.dir, applied, "service descriptors applied");
        }
        Ok(applied)
    }

    /// Initial scan, then rescan every interval until `shutdown` flips.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(dir = ?self.dir, interval = ?self.interval, "descriptor reload started");

        loop {
            if let Err(e) = self.reload_once() {
                warn!(dir = ?self.dir, error = %e, "descriptor scan failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    info!("descriptor reload shutting down");
                    break;
                }
            }
        }
    }
}
