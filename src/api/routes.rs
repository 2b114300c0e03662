use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::dataset;
use crate::api::handlers::dataset::AppState;
use crate::config::Config;
use crate::services::query_service::QueryGuardService;

/// Create router with application state
pub fn create_router_with_state(service: Arc<QueryGuardService>, config: Config) -> Router {
    let state = AppState { config, service };

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/datasets/{id}/query",
            post(dataset::execute_query),
        )
        .route(
            "/api/datasets/{id}/invalidate",
            post(dataset::invalidate_cache),
        )
        .route(
            "/api/datasets/{id}/history",
            delete(dataset::reset_history),
        )
        .route("/api/cache/stats", get(dataset::cache_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
