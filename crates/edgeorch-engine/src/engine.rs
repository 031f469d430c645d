//! Decision engine — the per-device entry point for every operation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use edgeorch_admission::{CommandAdmission, RequesterAdmission};
use edgeorch_core::*;
use edgeorch_dispatch::Dispatcher;
use edgeorch_placement::Placer;
use edgeorch_registry::{HttpDiscovery, PeerRegistry, ScoreExchange};
use edgeorch_scoring::ResourceScorer;

/// Per-device engine. Constructed by [`EngineBuilder`](crate::EngineBuilder)
/// and shared behind an `Arc`.
pub struct DecisionEngine {
    pub(crate) device_id: DeviceId,
    pub(crate) address: String,
    pub(crate) requesters: Arc<RequesterAdmission>,
    pub(crate) commands: Arc<CommandAdmission>,
    pub(crate) registry: Arc<PeerRegistry>,
    pub(crate) scorer: Arc<ResourceScorer>,
    pub(crate) discovery: Arc<HttpDiscovery>,
    pub(crate) placer: Placer,
    pub(crate) dispatcher: Dispatcher,
}

impl DecisionEngine {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    pub fn discovery(&self) -> &Arc<HttpDiscovery> {
        &self.discovery
    }

    // ── Service configuration ──────────────────────────────────────

    pub fn register_service(&self, service: &str, executable: &str) -> EngineResult<()> {
        self.commands.register(service, executable)
    }

    pub fn store_requesters(&self, service: &str, requesters: Vec<String>) {
        self.requesters.store(service, requesters);
    }

    /// Register the executable, then replace the allow-list. A refused
    /// executable leaves the allow-list untouched.
    pub fn apply_descriptor(&self, descriptor: &ServiceDescriptor) -> EngineResult<()> {
        self.register_service(&descriptor.service_name, &descriptor.executable)?;
        self.store_requesters(
            &descriptor.service_name,
            descriptor.allowed_requesters.clone(),
        );
        Ok(())
    }

    // ── Invocation ─────────────────────────────────────────────────

    /// Admit, place and dispatch one invocation.
    pub async fn invoke(&self, request: &InvokeRequest) -> EngineResult<InvokeResponse> {
        let service = &request.service_name;
        debug!(%service, requester = %request.requester, args = request.args.len(), "invoke");

        let executable = self
            .placer
            .admit(service, &request.requester, &request.args)?;
        let decision = self.placer.decide(service).await?;

        let execution = RemoteExecution {
            service_name: service.clone(),
            requester: request.requester.clone(),
            executable,
            args: request.args.clone(),
        };
        let timeout = request.timeout_ms.map(Duration::from_millis);
        let output = self.dispatcher.dispatch(&decision, &execution, timeout).await?;

        info!(
            %service,
            target = %decision.target_device_id,
            is_local = decision.is_local,
            exit_code = ?output.exit_code,
            "invocation complete"
        );

        Ok(InvokeResponse {
            service_name: service.clone(),
            target_device_id: decision.target_device_id,
            is_local: decision.is_local,
            output,
        })
    }

    /// Placement only, without running anything.
    pub async fn place(&self, service: &str, requester: &str) -> EngineResult<PlacementDecision> {
        self.placer.place(service, requester).await
    }

    /// Run a sealed, forwarded execution on this device and seal the output.
    ///
    /// The forwarding device already ran admission, but every check is
    /// repeated against the local tables before anything is spawned.
    pub async fn execute_remote(&self, sealed: &[u8]) -> EngineResult<Vec<u8>> {
        let cipher = self.dispatcher.cipher();
        let plain = cipher.open(sealed).map_err(|e| {
            warn!(error = %e, "rejecting unreadable remote execution");
            EngineError::InvalidCommand(format!("unreadable payload: {e}"))
        })?;
        let execution: RemoteExecution = serde_json::from_slice(&plain)
            .map_err(|e| EngineError::InvalidCommand(format!("malformed payload: {e}")))?;

        let service = &execution.service_name;
        self.requesters.check(service, &execution.requester)?;
        self.commands.verify(service, &execution.executable)?;
        self.commands.check_args(&execution.args)?;

        info!(%service, requester = %execution.requester, "executing forwarded invocation");

        let output = self
            .dispatcher
            .executor()
            .execute(&execution.executable, &execution.args)
            .await
            .map_err(|e| EngineError::dispatch(&self.device_id, e))?;

        let body = serde_json::to_vec(&output).map_err(|e| EngineError::dispatch(&self.device_id, e))?;
        cipher
            .seal(&body)
            .map_err(|e| EngineError::dispatch(&self.device_id, e))
    }

    // ── Scores and peers ───────────────────────────────────────────

    /// This device's score measured against `target_device_id`.
    pub async fn score(&self, target_device_id: &str) -> f64 {
        self.scorer.score(target_device_id).await
    }

    pub fn peers(&self) -> Vec<PeerEntry> {
        self.registry.snapshot()
    }

    /// Feed an inbound announcement to discovery.
    pub fn observe(&self, announcement: &Announcement) -> bool {
        self.discovery.observe(announcement)
    }

    /// Background task publishing this device's score to the seeds.
    pub fn score_exchange(&self, interval: Duration, liveness_window: Duration) -> ScoreExchange {
        ScoreExchange::new(
            self.device_id.clone(),
            self.scorer.clone(),
            self.discovery.clone(),
        )
        .with_interval(interval)
        .with_liveness_window(liveness_window)
    }

    /// Release telemetry. Later scores are `0.0`.
    pub fn close(&self) {
        info!(device_id = %self.device_id, "closing decision engine");
        self.scorer.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use edgeorch_dispatch::{Cipher, DispatchError, DispatchResult, Executor, SecureTransport};
    use edgeorch_scoring::{Telemetry, TelemetryError, TelemetryResult};
    use parking_lot::Mutex;

    use crate::EngineBuilder;

    /// Every reading equals `level`; `None` makes CPU usage fail.
    struct LevelTelemetry(Option<f64>);

    #[async_trait]
    impl Telemetry for LevelTelemetry {
        async fn cpu_usage(&self) -> TelemetryResult<f64> {
            self.0.ok_or_else(|| TelemetryError::Unavailable("cpu/usage".into()))
        }
        async fn cpu_count(&self) -> TelemetryResult<f64> {
            Ok(self.0.unwrap_or(1.0))
        }
        async fn cpu_freq(&self) -> TelemetryResult<f64> {
            Ok(self.0.unwrap_or(1.0))
        }
        async fn network_bandwidth(&self) -> TelemetryResult<f64> {
            Ok(self.0.unwrap_or(1.0))
        }
        async fn round_trip_time(&self, _target: &str) -> TelemetryResult<f64> {
            Ok(1.0)
        }
    }

    /// Echoes its arguments and records what it ran.
    #[derive(Default)]
    struct EchoExecutor {
        ran: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Executor for EchoExecutor {
        async fn execute(&self, executable: &str, args: &[String]) -> DispatchResult<ExecutionOutput> {
            self.ran.lock().push(executable.to_string());
            Ok(ExecutionOutput {
                exit_code: Some(0),
                stdout: args.join(" "),
                stderr: String::new(),
            })
        }
    }

    /// Delivers straight into a peer engine's `execute_remote`.
    struct Loopback {
        peer: Mutex<Option<Arc<DecisionEngine>>>,
    }

    #[async_trait]
    impl SecureTransport for Loopback {
        async fn send(
            &self,
            _address: &str,
            payload: &RemoteExecution,
            cipher: &Cipher,
        ) -> DispatchResult<ExecutionOutput> {
            let peer = self.peer.lock().clone();
            let Some(peer) = peer else {
                return Err(DispatchError::Http("no peer attached".to_string()));
            };
            let sealed = cipher.seal(&serde_json::to_vec(payload)?)?;
            let reply = peer
                .execute_remote(&sealed)
                .await
                .map_err(|e| DispatchError::Status {
                    status: 500,
                    body: e.to_string(),
                })?;
            Ok(serde_json::from_slice(&cipher.open(&reply)?)?)
        }
    }

    fn descriptor(requesters: &[&str]) -> ServiceDescriptor {
        ServiceDescriptor {
            service_name: "resize".to_string(),
            executable: "/opt/bin/resize".to_string(),
            allowed_requesters: requesters.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn request(args: &[&str]) -> InvokeRequest {
        InvokeRequest {
            service_name: "resize".to_string(),
            requester: "camera-1".to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout_ms: None,
        }
    }

    fn local_engine(level: Option<f64>, executor: Arc<EchoExecutor>) -> DecisionEngine {
        EngineBuilder::new("dev-a", "10.0.0.1:56001")
            .telemetry(Arc::new(LevelTelemetry(level)))
            .executor(executor)
            .build()
    }

    #[tokio::test]
    async fn invoke_runs_locally_without_peers() {
        let executor = Arc::new(EchoExecutor::default());
        let engine = local_engine(Some(1.0), executor.clone());
        engine.apply_descriptor(&descriptor(&["camera-1"])).unwrap();

        let resp = engine.invoke(&request(&["--width", "640"])).await.unwrap();

        assert!(resp.is_local);
        assert_eq!(resp.target_device_id, "dev-a");
        assert_eq!(resp.output.stdout, "--width 640");
        assert_eq!(*executor.ran.lock(), vec!["/opt/bin/resize".to_string()]);
    }

    #[tokio::test]
    async fn invoke_checks_requester_before_anything_else() {
        let executor = Arc::new(EchoExecutor::default());
        let engine = local_engine(Some(1.0), executor.clone());
        engine.apply_descriptor(&descriptor(&["camera-2"])).unwrap();

        let err = engine.invoke(&request(&[])).await.unwrap_err();

        assert_eq!(err.kind(), "requester_not_allowed");
        assert!(executor.ran.lock().is_empty());
    }

    /// Counts every sample taken.
    #[derive(Default)]
    struct CountingTelemetry {
        samples: AtomicUsize,
    }

    impl CountingTelemetry {
        fn hit(&self) -> TelemetryResult<f64> {
            self.samples.fetch_add(1, Ordering::SeqCst);
            Ok(1.0)
        }
    }

    #[async_trait]
    impl Telemetry for CountingTelemetry {
        async fn cpu_usage(&self) -> TelemetryResult<f64> {
            self.hit()
        }
        async fn cpu_count(&self) -> TelemetryResult<f64> {
            self.hit()
        }
        async fn cpu_freq(&self) -> TelemetryResult<f64> {
            self.hit()
        }
        async fn network_bandwidth(&self) -> TelemetryResult<f64> {
            self.hit()
        }
        async fn round_trip_time(&self, _target: &str) -> TelemetryResult<f64> {
            self.hit()
        }
    }

    #[tokio::test]
    async fn failed_admission_never_samples_or_dispatches() {
        let telemetry = Arc::new(CountingTelemetry::default());
        let executor = Arc::new(EchoExecutor::default());
        let engine = EngineBuilder::new("dev-a", "10.0.0.1:56001")
            .telemetry(telemetry.clone())
            .executor(executor.clone())
            .build();
        engine.apply_descriptor(&descriptor(&["camera-2"])).unwrap();
        engine.store_requesters("detect", vec!["camera-1".to_string()]);

        let stranger = engine.invoke(&request(&[])).await.unwrap_err();
        assert_eq!(stranger.kind(), "requester_not_allowed");

        let unregistered = engine
            .invoke(&InvokeRequest {
                service_name: "detect".to_string(),
                ..request(&[])
            })
            .await
            .unwrap_err();
        assert_eq!(unregistered.kind(), "service_not_registered");

        engine.store_requesters("resize", vec!["camera-1".to_string()]);
        let injected = engine.invoke(&request(&["$(reboot)"])).await.unwrap_err();
        assert_eq!(injected.kind(), "invalid_command");

        let placed = engine.place("detect", "camera-1").await.unwrap_err();
        assert_eq!(placed.kind(), "service_not_registered");

        assert_eq!(telemetry.samples.load(Ordering::SeqCst), 0);
        assert!(executor.ran.lock().is_empty());

        // The same engine does sample once admission passes.
        engine.invoke(&request(&["ok"])).await.unwrap();
        assert!(telemetry.samples.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn invoke_rejects_injected_arguments() {
        let executor = Arc::new(EchoExecutor::default());
        let engine = local_engine(Some(1.0), executor.clone());
        engine.apply_descriptor(&descriptor(&["camera-1"])).unwrap();

        let err = engine.invoke(&request(&["x; reboot"])).await.unwrap_err();

        assert_eq!(err.kind(), "invalid_command");
        assert!(executor.ran.lock().is_empty());
    }

    #[tokio::test]
    async fn invoke_without_any_score_has_no_target() {
        let engine = local_engine(None, Arc::new(EchoExecutor::default()));
        engine.apply_descriptor(&descriptor(&["camera-1"])).unwrap();

        let err = engine.invoke(&request(&[])).await.unwrap_err();
        assert_eq!(err.kind(), "no_eligible_target");
    }

    #[tokio::test]
    async fn unregistered_service_is_reported() {
        let engine = local_engine(Some(1.0), Arc::new(EchoExecutor::default()));
        engine.store_requesters("resize", vec!["camera-1".to_string()]);

        let err = engine.invoke(&request(&[])).await.unwrap_err();
        assert_eq!(err.kind(), "service_not_registered");
    }

    #[test]
    fn denylisted_descriptor_keeps_previous_requesters() {
        let engine = local_engine(Some(1.0), Arc::new(EchoExecutor::default()));
        engine.apply_descriptor(&descriptor(&["camera-1"])).unwrap();

        let bad = ServiceDescriptor {
            executable: "/bin/sudo".to_string(),
            allowed_requesters: vec!["intruder".to_string()],
            ..descriptor(&[])
        };
        let err = engine.apply_descriptor(&bad).unwrap_err();

        assert_eq!(err.kind(), "disallowed_executable");
        assert_eq!(
            engine.requesters.requesters("resize"),
            Some(vec!["camera-1".to_string()])
        );
    }

    #[tokio::test]
    async fn invoke_forwards_to_fitter_peer_and_back() {
        let cipher = Cipher::authenticated(b"fleet key").unwrap();

        // B's announced score beats A's own, so A forwards.
        let b_exec = Arc::new(EchoExecutor::default());
        let b = Arc::new(
            EngineBuilder::new("dev-b", "10.0.0.2:56001")
                .telemetry(Arc::new(LevelTelemetry(Some(1.0))))
                .executor(b_exec.clone())
                .cipher(cipher.clone())
                .build(),
        );
        b.apply_descriptor(&descriptor(&["camera-1"])).unwrap();

        let loopback = Arc::new(Loopback {
            peer: Mutex::new(Some(b.clone())),
        });
        let a_exec = Arc::new(EchoExecutor::default());
        let a = EngineBuilder::new("dev-a", "10.0.0.1:56001")
            .telemetry(Arc::new(LevelTelemetry(Some(1.0))))
            .executor(a_exec.clone())
            .transport(loopback)
            .cipher(cipher)
            .build();
        a.apply_descriptor(&descriptor(&["camera-1"])).unwrap();

        a.observe(&Announcement {
            device_id: "dev-b".to_string(),
            address: "10.0.0.2:56001".to_string(),
            score: DeviceScore::now("dev-b", 100.0),
        });

        let resp = a.invoke(&request(&["--fast"])).await.unwrap();

        assert!(!resp.is_local);
        assert_eq!(resp.target_device_id, "dev-b");
        assert_eq!(resp.output.stdout, "--fast");
        assert!(a_exec.ran.lock().is_empty());
        assert_eq!(*b_exec.ran.lock(), vec!["/opt/bin/resize".to_string()]);
    }

    #[tokio::test]
    async fn execute_remote_rechecks_local_tables() {
        let cipher = Cipher::PassThrough;
        let executor = Arc::new(EchoExecutor::default());
        let engine = local_engine(Some(1.0), executor.clone());
        engine.apply_descriptor(&descriptor(&["camera-1"])).unwrap();

        let forwarded = |requester: &str, executable: &str, args: &[&str]| {
            let exec = RemoteExecution {
                service_name: "resize".to_string(),
                requester: requester.to_string(),
                executable: executable.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
            };
            cipher.seal(&serde_json::to_vec(&exec).unwrap()).unwrap()
        };

        let err = engine
            .execute_remote(&forwarded("stranger", "/opt/bin/resize", &[]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "requester_not_allowed");

        let err = engine
            .execute_remote(&forwarded("camera-1", "/bin/other", &[]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_command");

        let err = engine
            .execute_remote(&forwarded("camera-1", "/opt/bin/resize", &["a|b"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_command");

        assert!(executor.ran.lock().is_empty());

        let reply = engine
            .execute_remote(&forwarded("camera-1", "/opt/bin/resize", &["ok"]))
            .await
            .unwrap();
        let output: ExecutionOutput = serde_json::from_slice(&reply).unwrap();
        assert_eq!(output.stdout, "ok");
    }

    #[tokio::test]
    async fn execute_remote_rejects_garbage() {
        let engine = EngineBuilder::new("dev-a", "10.0.0.1:56001")
            .telemetry(Arc::new(LevelTelemetry(Some(1.0))))
            .cipher(Cipher::authenticated(b"k").unwrap())
            .build();

        let err = engine.execute_remote(b"not sealed at all").await.unwrap_err();
        assert_eq!(err.kind(), "invalid_command");
    }

    #[tokio::test]
    async fn own_announcement_is_not_a_peer() {
        let engine = local_engine(Some(1.0), Arc::new(EchoExecutor::default()));
        assert!(!engine.observe(&Announcement {
            device_id: "dev-a".to_string(),
            address: "10.0.0.1:56001".to_string(),
            score: DeviceScore::now("dev-a", 9.0),
        }));
        assert!(engine.peers().is_empty());
    }

    #[tokio::test]
    async fn close_zeroes_the_score() {
        let engine = local_engine(Some(1.0), Arc::new(EchoExecutor::default()));
        assert!(engine.score("dev-a").await > 0.0);
        engine.close();
        assert_eq!(engine.score("dev-a").await, 0.0);
    }
}
