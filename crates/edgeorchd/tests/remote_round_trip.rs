//! Two-device integration tests.
//!
//! Starts two engines on loopback listeners, connects them through the
//! real HTTP discovery and sealed execute transport, and checks that an
//! invocation on the weaker device runs on the stronger one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use edgeorch_core::*;
use edgeorch_dispatch::Cipher;
use edgeorch_engine::{DecisionEngine, EngineBuilder};
use edgeorch_scoring::{Telemetry, TelemetryResult};

/// Telemetry whose CPU frequency sets the device's class.
struct ClassTelemetry {
    freq_mhz: f64,
}

#[async_trait]
impl Telemetry for ClassTelemetry {
    async fn cpu_usage(&self) -> TelemetryResult<f64> {
        Ok(20.0)
    }
    async fn cpu_count(&self) -> TelemetryResult<f64> {
        Ok(4.0)
    }
    async fn cpu_freq(&self) -> TelemetryResult<f64> {
        Ok(self.freq_mhz)
    }
    async fn network_bandwidth(&self) -> TelemetryResult<f64> {
        Ok(1000.0)
    }
    async fn round_trip_time(&self, _target: &str) -> TelemetryResult<f64> {
        Ok(0.01)
    }
}

struct Device {
    engine: Arc<DecisionEngine>,
    address: String,
}

/// Bind first so the engine can advertise its real address.
async fn start_device(
    id: &str,
    freq_mhz: f64,
    cipher: Cipher,
    seeds: Vec<String>,
) -> Device {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let engine = Arc::new(
        EngineBuilder::new(id, address.clone())
            .telemetry(Arc::new(ClassTelemetry { freq_mhz }))
            .cipher(cipher)
            .dispatch_timeout(Duration::from_secs(5))
            .seeds(seeds)
            .build(),
    );

    let router = edgeorch_api::build_router(engine.clone());
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .await
        .unwrap();
    });

    Device { engine, address }
}

fn echo_service() -> ServiceDescriptor {
    ServiceDescriptor {
        service_name: "echo".to_string(),
        executable: "echo".to_string(),
        allowed_requesters: vec!["camera-1".to_string()],
    }
}

fn invoke(args: &[&str]) -> InvokeRequest {
    InvokeRequest {
        service_name: "echo".to_string(),
        requester: "camera-1".to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        timeout_ms: None,
    }
}

#[tokio::test]
async fn weak_device_forwards_to_strong_device() {
    let cipher = Cipher::authenticated(b"fleet passphrase").unwrap();

    let gateway = start_device("gateway", 3000.0, cipher.clone(), vec![]).await;
    let phone = start_device("phone", 400.0, cipher, vec![]).await;
    gateway.engine.apply_descriptor(&echo_service()).unwrap();
    phone.engine.apply_descriptor(&echo_service()).unwrap();

    // The gateway announces itself to the phone the way the exchange loop would.
    let gateway_seeded = edgeorch_registry::HttpDiscovery::new(
        "gateway".to_string(),
        gateway.address.clone(),
        vec![phone.address.clone()],
        gateway.engine.registry().clone(),
    );
    let exchange = edgeorch_registry::ScoreExchange::new(
        "gateway".to_string(),
        Arc::new(edgeorch_scoring::ResourceScorer::new(Arc::new(ClassTelemetry {
            freq_mhz: 3000.0,
        }))),
        Arc::new(gateway_seeded),
    );
    assert!(exchange.publish_once().await > 0.0);

    let peers = phone.engine.peers();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].device_id, "gateway");
    assert_eq!(peers[0].address, gateway.address);

    let resp = phone.engine.invoke(&invoke(&["hello", "edge"])).await.unwrap();

    assert!(!resp.is_local);
    assert_eq!(resp.target_device_id, "gateway");
    assert_eq!(resp.output.exit_code, Some(0));
    assert_eq!(resp.output.stdout.trim(), "hello edge");
}

#[tokio::test]
async fn remote_side_enforces_its_own_allow_list() {
    let cipher = Cipher::authenticated(b"fleet passphrase").unwrap();

    let gateway = start_device("gateway", 3000.0, cipher.clone(), vec![]).await;
    let phone = start_device("phone", 400.0, cipher, vec![]).await;

    // Gateway knows the service but does not trust camera-1.
    gateway
        .engine
        .apply_descriptor(&ServiceDescriptor {
            allowed_requesters: vec!["camera-2".to_string()],
            ..echo_service()
        })
        .unwrap();
    phone.engine.apply_descriptor(&echo_service()).unwrap();

    phone.engine.observe(&Announcement {
        device_id: "gateway".to_string(),
        address: gateway.address.clone(),
        score: DeviceScore::now("gateway", 1_000.0),
    });

    let err = phone.engine.invoke(&invoke(&["hi"])).await.unwrap_err();
    assert_eq!(err.kind(), "dispatch_failed");
}

#[tokio::test]
async fn mismatched_ciphers_fail_dispatch() {
    let gateway = start_device(
        "gateway",
        3000.0,
        Cipher::authenticated(b"gateway key").unwrap(),
        vec![],
    )
    .await;
    let phone = start_device(
        "phone",
        400.0,
        Cipher::authenticated(b"phone key").unwrap(),
        vec![],
    )
    .await;
    gateway.engine.apply_descriptor(&echo_service()).unwrap();
    phone.engine.apply_descriptor(&echo_service()).unwrap();

    phone.engine.observe(&Announcement {
        device_id: "gateway".to_string(),
        address: gateway.address.clone(),
        score: DeviceScore::now("gateway", 1_000.0),
    });

    let err = phone.engine.invoke(&invoke(&["hi"])).await.unwrap_err();
    assert_eq!(err.kind(), "dispatch_failed");
}

#[tokio::test]
async fn stronger_local_device_keeps_work() {
    let gateway = start_device("gateway", 3000.0, Cipher::PassThrough, vec![]).await;
    gateway.engine.apply_descriptor(&echo_service()).unwrap();

    gateway.engine.observe(&Announcement {
        device_id: "phone".to_string(),
        address: "127.0.0.1:9".to_string(),
        score: DeviceScore::now("phone", 0.01),
    });

    let resp = gateway.engine.invoke(&invoke(&["local"])).await.unwrap();
    assert!(resp.is_local);
    assert_eq!(resp.output.stdout.trim(), "local");
}
