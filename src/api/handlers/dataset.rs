use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::config::Config;
use crate::models::{DatasetQueryRequest, QueryOutcome};
use crate::services::query_cache::CacheStats;
use crate::services::query_service::QueryGuardService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub service: Arc<QueryGuardService>,
}

/// Execute a guarded SQL query against a dataset table.
///
/// Always returns the structured outcome: validation and execution failures
/// are values in the payload, not HTTP errors, so the calling agent can
/// react deterministically.
pub async fn execute_query(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
    Json(payload): Json<DatasetQueryRequest>,
) -> Json<QueryOutcome> {
    tracing::info!("Executing query for dataset: {}", dataset_id);
    let outcome = state.service.execute(&dataset_id, &payload).await;
    Json(outcome)
}

/// Drop cached results for a dataset
pub async fn invalidate_cache(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
) -> Json<serde_json::Value> {
    let invalidated = state.service.invalidate(&dataset_id);
    tracing::info!(
        "Invalidated {} cache entries for dataset {}",
        invalidated,
        dataset_id
    );
    Json(serde_json::json!({ "invalidated": invalidated }))
}

/// Reset a dataset's session history (called by the session manager when an
/// analysis session ends)
pub async fn reset_history(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
) -> Json<serde_json::Value> {
    let cleared = state.service.reset_session(&dataset_id);
    Json(serde_json::json!({ "cleared": cleared }))
}

/// Cache hit/miss counters
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.service.cache_stats())
}
