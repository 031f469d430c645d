//! REST API handlers.
//!
//! JSON in, JSON out, except `/execute` which carries sealed bytes both
//! ways. Engine errors map to a fixed status per kind and a body of
//! `{success: false, error, kind}`. Invocations from a non-loopback
//! address are refused with 403 and kind `non_local_caller`.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tracing::{debug, warn};

use edgeorch_core::*;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        })
    }
}

/// HTTP status for each engine error kind.
pub fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::RequesterNotAllowed { .. } => StatusCode::FORBIDDEN,
        EngineError::ServiceNotRegistered(_) => StatusCode::NOT_FOUND,
        EngineError::DisallowedExecutable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
        EngineError::NoEligibleTarget(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::DispatchFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn engine_error(err: &EngineError) -> Response {
    let status = status_for(err);
    debug!(kind = err.kind(), status = status.as_u16(), error = %err, "request failed");
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
        }),
    )
        .into_response()
}

fn non_local_caller(peer: SocketAddr) -> Response {
    warn!(%peer, "refusing invocation from non-local caller");
    (
        StatusCode::FORBIDDEN,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(format!("invocations are accepted from loopback only, not {}", peer.ip())),
            kind: Some("non_local_caller"),
        }),
    )
        .into_response()
}

// ── Peers ──────────────────────────────────────────────────────

/// GET /api/v1/ping
pub async fn ping(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({ "device_id": state.engine.device_id() }))
}

/// GET /api/v1/score/:target
pub async fn get_score(
    State(state): State<ApiState>,
    Path(target): Path<String>,
) -> impl IntoResponse {
    let score = state.engine.score(&target).await;
    ApiResponse::ok(DeviceScore::now(state.engine.device_id(), score))
}

/// GET /api/v1/peers
pub async fn list_peers(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.engine.peers())
}

/// POST /api/v1/peers/announce
pub async fn announce(
    State(state): State<ApiState>,
    Json(announcement): Json<Announcement>,
) -> impl IntoResponse {
    let accepted = state.engine.observe(&announcement);
    ApiResponse::ok(serde_json::json!({ "accepted": accepted }))
}

// ── Services ───────────────────────────────────────────────────

/// Invoke request body; the service name comes from the path.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct InvokeBody {
    pub requester: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// POST /api/v1/services/:name/invoke
pub async fn invoke_service(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(name): Path<String>,
    Json(body): Json<InvokeBody>,
) -> Response {
    if !peer.ip().to_canonical().is_loopback() {
        return non_local_caller(peer);
    }
    let request = InvokeRequest {
        service_name: name,
        requester: body.requester,
        args: body.args,
        timeout_ms: body.timeout_ms,
    };
    match state.engine.invoke(&request).await {
        Ok(resp) => ApiResponse::ok(resp).into_response(),
        Err(e) => engine_error(&e),
    }
}

/// POST /api/v1/execute
pub async fn execute_remote(State(state): State<ApiState>, body: Bytes) -> Response {
    match state.engine.execute_remote(&body).await {
        Ok(sealed) => (
            StatusCode::OK,
            [("content-type", "application/octet-stream")],
            sealed,
        )
            .into_response(),
        Err(e) => engine_error(&e),
    }
}
