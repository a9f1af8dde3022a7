//! HTTP router construction.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/almanac/data", get(api::almanac_data))
        .route("/api/almanac/date_control", post(api::date_control))
        .route("/api/almanac/metrics", get(api::metrics))
        .route("/api/almanac/reload", post(api::reload))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
