//! HTTP ping used to measure round-trip latency to a peer.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::telemetry::{TelemetryError, TelemetryResult};

/// Path every EdgeOrch endpoint answers for latency probes.
pub const PING_PATH: &str = "/api/v1/ping";

/// Time a `GET /api/v1/ping` against `address` (`host:port`).
///
/// Only a 2xx answer within `timeout` counts as a measurement.
pub async fn ping(address: &str, timeout: Duration) -> TelemetryResult<Duration> {
    let uri = format!("http://{address}{PING_PATH}");
    let started = Instant::now();

    let result = tokio::time::timeout(timeout, async {
        let stream = tokio::net::TcpStream::connect(address).await?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| TelemetryError::Probe(format!("handshake: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", address)
            .header("user-agent", "edgeorch-scoring/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| TelemetryError::Probe(format!("build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| TelemetryError::Probe(format!("request: {e}")))?;

        if resp.status().is_success() {
            Ok::<Duration, TelemetryError>(started.elapsed())
        } else {
            Err(TelemetryError::Probe(format!("non-2xx status {}", resp.status())))
        }
    })
    .await;

    match result {
        Ok(Ok(rtt)) => Ok(rtt),
        Ok(Err(e)) => {
            debug!(error = %e, %uri, "ping failed");
            Err(e)
        }
        Err(_) => {
            debug!(%uri, "ping timed out");
            Err(TelemetryError::Probe(format!("timed out after {timeout:?}")))
        }
    }
}
