//! edgeorch-api — REST surface of a device.
//!
//! Serves local callers (invoke) and peers (latency pings, announcements,
//! forwarded executions) on one listener. Services are registered only
//! from the descriptor directory; invoke accepts loopback callers only.
//!
//! The router reads the caller address through `ConnectInfo`, so it must
//! be served with `into_make_service_with_connect_info::<SocketAddr>()`.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/ping` | Latency probe target |
//! | POST | `/api/v1/services/{name}/invoke` | Invoke a service (loopback only) |
//! | POST | `/api/v1/execute` | Run a sealed forwarded execution |
//! | GET | `/api/v1/score/{target}` | Local score against a target device |
//! | GET | `/api/v1/peers` | Peer registry snapshot |
//! | POST | `/api/v1/peers/announce` | Inbound score announcement |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use edgeorch_engine::DecisionEngine;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<DecisionEngine>,
}

/// Build the complete API router.
pub fn build_router(engine: Arc<DecisionEngine>) -> Router {
    let state = ApiState { engine };

    let api_routes = Router::new()
        .route("/ping", get(handlers::ping))
        .route("/services/{name}/invoke", post(handlers::invoke_service))
        .route("/execute", post(handlers::execute_remote))
        .route("/score/{target}", get(handlers::get_score))
        .route("/peers", get(handlers::list_peers))
        .route("/peers/announce", post(handlers::announce))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
