//! Axum-based HTTP server.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::fanout::events_handler;
use crate::macros::macro_handler;
use crate::state::GatewayState;
use crate::status::{canvas_handler, client_handler, health_handler, status_handler};

/// All gateway routes over shared state.
pub fn router(state: Arc<GatewayState>) -> Router {
    let app = Router::new()
        .route("/events", get(events_handler))
        .route("/api/macros/{name}", post(macro_handler))
        .route("/api/status", get(status_handler))
        .route("/api/canvas", get(canvas_handler))
        .route("/api/client", get(client_handler))
        .route("/health", get(health_handler));

    #[cfg(feature = "metrics")]
    let app = app.route("/metrics", get(metrics_handler));

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the session tracker and serve until Ctrl-C or the shutdown token fires.
///
/// On return the tracker has been stopped and every fan-out stream ended.
pub async fn start_gateway(state: Arc<GatewayState>, port: u16) -> anyhow::Result<()> {
    let bind_addr = state.config.gateway_bind();
    let addr = format!("{bind_addr}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on {addr}");

    state.tracker.start().await;

    let shutdown = state.shutdown.clone();
    let served = axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown_signal() => shutdown.cancel(),
                _ = shutdown.cancelled() => {}
            }
        })
        .await;

    state.shutdown.cancel();
    state.tracker.stop().await;
    info!("Gateway stopped");
    served?;
    Ok(())
}

#[cfg(feature = "metrics")]
async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<Arc<GatewayState>>,
) -> axum::response::Response {
    use axum::response::IntoResponse;
    match &state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => axum::http::StatusCode::NOT_FOUND.into_response(),
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
