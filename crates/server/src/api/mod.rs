pub mod admin;
pub mod health;
pub mod objects;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vanish_lifecycle::{LifecycleManager, Reaper};

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The lifecycle manager.
    pub manager: Arc<LifecycleManager>,
    /// The reaper whose pass guard the admin endpoint shares with the timer.
    pub reaper: Arc<Reaper>,
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: u64,
}

/// Build the Axum router with all API routes and middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .route("/v1/objects", post(objects::upload))
        .route(
            "/v1/objects/{id}",
            get(objects::download).delete(objects::delete),
        )
        .route("/v1/objects/{id}/meta", get(objects::meta))
        .route("/admin/reclaim", post(admin::reclaim))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
