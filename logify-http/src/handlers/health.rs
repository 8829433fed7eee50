use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;
use crate::dto::HealthResponse;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        node_id: state.service.config().node_id.clone(),
        store: state.service.store_kind().to_string(),
        consumer: state.service.stats(),
        build_profile: if cfg!(debug_assertions) { "debug" } else { "release" }.to_string(),
    })
}
