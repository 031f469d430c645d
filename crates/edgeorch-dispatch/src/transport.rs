//! Sealed HTTP transport to a peer's execute endpoint.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use tracing::debug;

use edgeorch_core::{ExecutionOutput, RemoteExecution};

use crate::cipher::Cipher;
use crate::error::{DispatchError, DispatchResult};

/// Path peers accept sealed remote executions on.
pub const EXECUTE_PATH: &str = "/api/v1/execute";

/// Delivers a remote execution to `address` and returns the peer's output.
#[async_trait]
pub trait SecureTransport: Send + Sync {
    async fn send(
        &self,
        address: &str,
        payload: &RemoteExecution,
        cipher: &Cipher,
    ) -> DispatchResult<ExecutionOutput>;
}

/// One HTTP/1 connection per request.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpTransport;

#[async_trait]
impl SecureTransport for HttpTransport {
    async fn send(
        &self,
        address: &str,
        payload: &RemoteExecution,
        cipher: &Cipher,
    ) -> DispatchResult<ExecutionOutput> {
        let sealed = cipher.seal(&serde_json::to_vec(payload)?)?;

        let stream = tokio::net::TcpStream::connect(address)
            .await
            .map_err(|source| DispatchError::Connect {
                address: address.to_string(),
                source,
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| DispatchError::Http(format!("handshake: {e}")))?;

        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("POST")
            .uri(format!("http://{address}{EXECUTE_PATH}"))
            .header("host", address)
            .header("content-type", "application/octet-stream")
            .header("user-agent", "edgeorch-dispatch/0.1")
            .body(Full::new(Bytes::from(sealed)))
            .map_err(|e| DispatchError::Http(format!("build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| DispatchError::Http(format!("request: {e}")))?;

        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| DispatchError::Http(format!("read body: {e}")))?
            .to_bytes();

        if !status.is_success() {
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let output: ExecutionOutput = serde_json::from_slice(&cipher.open(&body)?)?;
        debug!(%address, service = %payload.service_name, exit_code = ?output.exit_code, "remote execution returned");
        Ok(output)
    }
}
