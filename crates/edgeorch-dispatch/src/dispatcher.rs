//! Dispatcher — runs a placement decision locally or forwards it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use edgeorch_core::{EngineError, EngineResult, ExecutionOutput, PlacementDecision, RemoteExecution};

use crate::cipher::Cipher;
use crate::error::DispatchError;
use crate::executor::Executor;
use crate::transport::SecureTransport;

pub struct Dispatcher {
    executor: Arc<dyn Executor>,
    transport: Arc<dyn SecureTransport>,
    cipher: Arc<Cipher>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        executor: Arc<dyn Executor>,
        transport: Arc<dyn SecureTransport>,
        cipher: Arc<Cipher>,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            transport,
            cipher,
            timeout,
        }
    }

    pub fn cipher(&self) -> &Cipher {
        &self.cipher
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    /// Carry out `decision`. Remote calls are bounded by `timeout`, or the
    /// configured default when `None`.
    pub async fn dispatch(
        &self,
        decision: &PlacementDecision,
        execution: &RemoteExecution,
        timeout: Option<Duration>,
    ) -> EngineResult<ExecutionOutput> {
        if decision.is_local {
            return self
                .executor
                .execute(&execution.executable, &execution.args)
                .await
                .map_err(|e| {
                    warn!(service = %execution.service_name, error = %e, "local execution failed");
                    EngineError::dispatch(&decision.target_device_id, e)
                });
        }

        let limit = timeout.unwrap_or(self.timeout);
        info!(
            service = %execution.service_name,
            target = %decision.target_device_id,
            address = %decision.target_address,
            timeout = ?limit,
            "forwarding to peer"
        );

        let sent = tokio::time::timeout(
            limit,
            self.transport
                .send(&decision.target_address, execution, &self.cipher),
        )
        .await;

        match sent {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => {
                warn!(target = %decision.target_device_id, error = %e, "remote dispatch failed");
                Err(EngineError::dispatch(&decision.target_device_id, e))
            }
            Err(_) => {
                warn!(target = %decision.target_device_id, timeout = ?limit, "remote dispatch timed out");
                Err(EngineError::dispatch(
                    &decision.target_device_id,
                    DispatchError::Timeout(limit),
                ))
            }
        }
    }
}
