//! API routes

pub mod health;
pub mod run;
pub mod ws;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::middleware::logging_middleware;
use crate::state::AppState;

/// Create the main API router.
///
/// The request-body ceiling is applied before any parsing so oversized
/// payloads are rejected without buffering them.
pub fn create_router(state: AppState) -> Router {
    let body_cap = state.config.limits.max_body_bytes();

    Router::new()
        .route("/api/run", post(run::run_batch))
        .route("/api/ws", get(ws::stream_upgrade))
        .route("/api/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .layer(DefaultBodyLimit::max(body_cap))
        .layer(axum::middleware::from_fn(logging_middleware))
        .with_state(state)
}
