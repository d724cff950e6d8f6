use crate::api::schemas::health::{LivenessResponse, ReadinessResponse, WarmupResponse};
use crate::api::{AppState, MgmtState};
use crate::error::{AppError, Result};
use crate::services::warmup_service::WARMUP_HEADER;
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};

/// Liveness report: status, timestamp, uptime, environment and version.
pub async fn liveness(State(state): State<AppState>) -> impl IntoResponse {
    let response = LivenessResponse::from(state.health_service.liveness());
    ([(header::CACHE_CONTROL, "no-store")], Json(response))
}

/// Pings the configured routes in sequence and reports each latency.
pub async fn warmup(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse> {
    // A warmup ping must never trigger another warmup run.
    if headers.contains_key(WARMUP_HEADER) {
        return Err(AppError::BadRequest("Nested warmup request".to_string()));
    }

    let report = state.warmup_service.run().await;
    Ok(([(header::CACHE_CONTROL, "no-store")], Json(WarmupResponse::from(report))))
}

/// Liveness probe: returns 200 OK as long as the server is running.
pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe: checks connectivity to the identity provider.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let (status_code, provider_status) = match state.health_service.check_provider().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, component = "identity_provider", "Readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "error")
        }
    };

    let response = ReadinessResponse {
        status: if status_code == StatusCode::OK { "ok" } else { "error" }.to_string(),
        identity_provider: provider_status.to_string(),
    };

    (status_code, Json(response))
}
