use crate::transport::http::types::{AppState, HealthResponse};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy (DB reachable)", body = HealthResponse),
        (status = 503, description = "Service is unhealthy (DB unreachable)", body = HealthResponse)
    )
)]
pub async fn healthcheck_handler(State(state): State<AppState>) -> impl IntoResponse {
    let cache = if state.cache.is_available() {
        "connected"
    } else {
        "degraded"
    };

    match sqlx::query("SELECT 1").execute(state.crud.pool()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                database: "ok".to_string(),
                cache: cache.to_string(),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    database: "unreachable".to_string(),
                    cache: cache.to_string(),
                }),
            )
        }
    }
}
