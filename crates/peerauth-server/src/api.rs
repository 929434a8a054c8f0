use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use peerauth_crypto::PeerId;
use peerauth_proto::WELL_KNOWN_PROTOCOLS_PATH;

use crate::metrics::AuthMetrics;
use crate::registry::WellKnownRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<WellKnownRegistry>,
    pub metrics: Arc<AuthMetrics>,
    pub peer_id: PeerId,
}

/// Unauthenticated routes: discovery, health and metrics.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(WELL_KNOWN_PROTOCOLS_PATH, get(get_well_known))
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

// GET /.well-known/peerauth/protocols
pub async fn get_well_known(State(state): State<AppState>) -> Response {
    let mut response = Json(state.registry.resolve()).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=300"),
    );
    response
}

// GET /health
pub async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "peer_id": state.peer_id.to_hex(),
    }))
}

// GET /metrics
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.export_prometheus() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Default protected resource: tells the caller who it authenticated as.
pub async fn whoami(peer: PeerId, _request: Request<Body>) -> Response {
    Json(json!({ "peer_id": peer.to_hex() })).into_response()
}
