use crate::services::health_service::Liveness;
use crate::services::warmup_service::{RouteResult, WarmupReport};
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessResponse {
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Seconds since the process started.
    pub uptime: f64,
    pub environment: String,
    pub version: String,
}

impl From<Liveness> for LivenessResponse {
    fn from(live: Liveness) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: live.timestamp,
            uptime: live.uptime.as_secs_f64(),
            environment: live.environment.to_string(),
            version: live.version.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub status: String,
    pub identity_provider: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResultResponse {
    pub route: String,
    pub success: bool,
    pub status_code: Option<u16>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl From<RouteResult> for RouteResultResponse {
    fn from(result: RouteResult) -> Self {
        Self {
            route: result.route,
            success: result.success,
            status_code: result.status_code,
            duration_ms: u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            error: result.error,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmupResponse {
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub total_duration_ms: u64,
    pub results: Vec<RouteResultResponse>,
}

impl From<WarmupReport> for WarmupResponse {
    fn from(report: WarmupReport) -> Self {
        Self {
            status: if report.all_succeeded() { "ok" } else { "degraded" }.to_string(),
            timestamp: report.timestamp,
            total_duration_ms: u64::try_from(report.total_duration.as_millis()).unwrap_or(u64::MAX),
            results: report.results.into_iter().map(Into::into).collect(),
        }
    }
}
