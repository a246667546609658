use axum::{Json, extract::State};

use crate::{AppState, types::HealthResponse};

/// Liveness and backend load state
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        backend: state.backends.backend_name().to_string(),
        model_loaded: state.backends.is_loaded(),
        idle_seconds: state.backends.idle_seconds(),
    })
}
