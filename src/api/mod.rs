//! Read-only HTTP surface (§6): `GET /api/v1/executions`, `GET
//! /api/v1/execution/{id}`, `GET /healthz`, `GET /metrics`.

pub mod handlers;
pub mod state;

use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/executions", get(handlers::list_executions))
        .route("/api/v1/execution/{id}", get(handlers::get_execution))
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
