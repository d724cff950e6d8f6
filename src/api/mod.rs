use crate::api::middleware::CookiePolicy;
use crate::api::rate_limit::{IpKeyExtractor, log_rate_limit_events};
use crate::config::Config;
use crate::error::AppError;
use crate::services::auth_reconciler::AuthReconciler;
use crate::services::health_service::HealthService;
use crate::services::route_guard::RouteGuard;
use crate::services::warmup_service::WarmupService;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod health;
pub mod middleware;
pub mod rate_limit;
pub mod schemas;

#[derive(Clone, Debug)]
pub struct AppState {
    pub reconciler: AuthReconciler,
    pub route_guard: RouteGuard,
    pub health_service: HealthService,
    pub warmup_service: WarmupService,
    pub cookies: CookiePolicy,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub reconciler: AuthReconciler,
    pub route_guard: RouteGuard,
    pub health_service: HealthService,
    pub warmup_service: WarmupService,
}

async fn not_found() -> AppError {
    AppError::NotFound
}

/// Configures and returns the primary application router.
///
/// # Panics
/// Panics if the rate limiter configuration cannot be constructed.
pub fn app_router(config: &Config, services: ServiceContainer) -> Router {
    let login_interval_ns = 1_000_000_000 / config.rate_limit.login_per_second.max(1);
    let login_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(login_interval_ns))
            .burst_size(config.rate_limit.login_burst.max(1))
            .key_extractor(IpKeyExtractor::new(config.server.trusted_proxies.clone()))
            .finish()
            .expect("Failed to build login rate limiter config"),
    );

    let cookies = CookiePolicy {
        secure: config.server.environment.is_hosted(),
        refresh_ttl: time::Duration::days(config.auth.refresh_cookie_ttl_days),
    };
    let request_timeout = Duration::from_secs(config.server.request_timeout_secs);
    let static_dir = config.server.static_dir.clone();

    let state = AppState {
        reconciler: services.reconciler,
        route_guard: services.route_guard,
        health_service: services.health_service,
        warmup_service: services.warmup_service,
        cookies,
    };

    // Sign-in is the only route worth brute forcing
    let login_routes = Router::new().route("/auth/login", post(auth::login)).layer(GovernorLayer::new(login_conf));

    let auth_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::session))
        .route("/auth/extend", post(auth::extend));

    let api_routes = Router::new()
        .route("/api/health", get(health::liveness))
        .route("/api/warmup", get(health::warmup))
        .route("/api/me", get(auth::me));

    let router = Router::new().merge(login_routes).merge(auth_routes).merge(api_routes);
    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.fallback(not_found),
    };

    router
        .layer(from_fn_with_state(state.clone(), middleware::route_guard))
        .layer(from_fn(log_rate_limit_events))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(PropagateRequestIdLayer::new(axum::http::HeaderName::from_static("x-request-id")))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(axum::http::HeaderName::from_static("x-request-id"), MakeRequestUuid))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
