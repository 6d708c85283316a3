//! Read-only status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use canvas_pilot_core::protocol::StatusPayload;

use crate::state::GatewayState;

pub async fn status_handler(State(state): State<Arc<GatewayState>>) -> Json<StatusPayload> {
    Json(StatusPayload::from(&state.tracker.snapshot()))
}

pub async fn canvas_handler(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    let session = state.tracker.snapshot();
    Json(json!({
        "canvas_id": session.canvas_id,
        "canvas_name": session.canvas_name,
    }))
}

pub async fn client_handler(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    let session = state.tracker.snapshot();
    Json(json!({
        "client_id": session.client_id,
        "client_name": session.client_name,
        "installation_name": state.tracker.installation_name(),
        "connected": session.connected,
    }))
}

pub async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connected": state.tracker.is_connected(),
        "fanout_connections": state.fanout_connections(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}
