use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Serialize;
use vanish_lifecycle::MetricsSnapshot;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub namespace: String,
    pub reaper_running: bool,
    pub metrics: MetricsSnapshot,
}

/// `GET /health` -- service status together with a metrics snapshot.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        namespace: state.manager.namespace().to_owned(),
        reaper_running: state.reaper.is_running(),
        metrics: state.manager.metrics().snapshot(),
    })
}

/// `GET /metrics` -- lifecycle counters.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.metrics().snapshot())
}
