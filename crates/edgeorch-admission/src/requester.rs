//! Requester admission — per-service allow-lists.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, info};

use edgeorch_core::{EngineError, EngineResult, ServiceName};

/// Who may invoke which service. Membership is an exact string match.
#[derive(Default)]
pub struct RequesterAdmission {
    allowed: Mutex<HashMap<ServiceName, Vec<String>>>,
}

impl RequesterAdmission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the allow-list for `service` wholesale.
    pub fn store(&self, service: &str, requesters: Vec<String>) {
        info!(%service, count = requesters.len(), "requester list stored");
        self.allowed.lock().insert(service.to_string(), requesters);
    }

    pub fn check(&self, service: &str, requester: &str) -> EngineResult<()> {
        let allowed = self.allowed.lock();
        let list = allowed
            .get(service)
            .ok_or_else(|| EngineError::ServiceNotRegistered(service.to_string()))?;

        if list.iter().any(|r| r == requester) {
            Ok(())
        } else {
            debug!(%service, %requester, "requester refused");
            Err(EngineError::RequesterNotAllowed {
                service: service.to_string(),
                requester: requester.to_string(),
            })
        }
    }

    pub fn requesters(&self, service: &str) -> Option<Vec<String>> {
        self.allowed.lock().get(service).cloned()
    }
}
