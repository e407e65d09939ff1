//! HTTP query server for PDU readings.
//!
//! Serves the latest snapshot from a shared [`MetricStore`] on the legacy
//! dashboard URLs. Every JSON response allows any origin.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::header,
    response::{IntoResponse, Json},
    routing::get,
};
use log::info;
use serde::Serialize;

use pdumon_core::MetricStore;

/// Plain-text response of `GET /`.
pub const GREETING: &str = "Solgae Power Info server reached!";

/// Shared server state.
struct AppState {
    store: Arc<MetricStore>,
}

fn cors_json<T: Serialize>(body: T) -> impl IntoResponse {
    ([(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")], Json(body))
}

async fn handle_index() -> &'static str {
    GREETING
}

async fn handle_total_accum_energy(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    cors_json(state.store.total_accumulated_energy())
}

async fn handle_accum_energy(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    cors_json(state.store.accumulated_energy())
}

// The route name predates the field; it serves input power in watts.
async fn handle_total_in_energy(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    cors_json(state.store.total_input_power())
}

async fn handle_current(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    cors_json(state.store.current())
}

async fn handle_current_queue(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    cors_json(state.store.current_history())
}

async fn handle_receptacles(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    cors_json(state.store.receptacle_state())
}

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    cors_json(state.store.health())
}

/// Build the axum router over `store`.
pub fn build_router(store: Arc<MetricStore>) -> Router {
    let state = Arc::new(AppState { store });

    Router::new()
        .route("/", get(handle_index))
        .route("/totalAccumEnergy", get(handle_total_accum_energy))
        .route("/accumEnergy", get(handle_accum_energy))
        .route("/totalInEnergy", get(handle_total_in_energy))
        .route("/current", get(handle_current))
        .route("/currentQueue", get(handle_current_queue))
        .route("/receptacles", get(handle_receptacles))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Bind `host:port` and serve until the listener fails.
pub async fn run_server(store: Arc<MetricStore>, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(store);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}
