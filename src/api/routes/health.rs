//! Health check endpoint

use axum::{Json, extract::State};

use crate::api::{state::ApiState, types::HealthResponse};

/// GET /api/health
///
/// Reports `degraded` once the broadcast hub no longer runs.
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let (status, subscribers) = match state.hub.subscriber_count().await {
        Ok(count) => ("ok", count),
        Err(_) => ("degraded", 0),
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        subscribers,
    })
}
