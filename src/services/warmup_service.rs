use crate::config::WarmupConfig;
use opentelemetry::{KeyValue, global, metrics::Histogram};
use std::time::{Duration, Instant};
use time::OffsetDateTime;

/// Marks requests sent by the warmup service itself.
pub const WARMUP_HEADER: &str = "x-warmup";

#[derive(Clone, Debug)]
struct Metrics {
    route_duration_seconds: Histogram<f64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("fleetdesk");
        Self {
            route_duration_seconds: meter
                .f64_histogram("warmup_route_duration_seconds")
                .with_description("Latency of warmup pings per route")
                .build(),
        }
    }
}

/// Result of pinging one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResult {
    pub route: String,
    pub success: bool,
    pub status_code: Option<u16>,
    pub duration: Duration,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WarmupReport {
    pub timestamp: OffsetDateTime,
    pub total_duration: Duration,
    pub results: Vec<RouteResult>,
}

impl WarmupReport {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }
}

/// Pings a fixed list of routes one after another so cold serverless
/// instances get spun up before an operator needs them.
#[derive(Clone, Debug)]
pub struct WarmupService {
    client: reqwest::Client,
    base_url: String,
    routes: Vec<String>,
    metrics: Metrics,
}

impl WarmupService {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &WarmupConfig, base_url: String) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let routes = config.routes.iter().map(|r| r.trim().to_string()).filter(|r| !r.is_empty()).collect();

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), routes, metrics: Metrics::new() })
    }

    #[must_use]
    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    /// Pings every configured route in order and reports each outcome.
    #[tracing::instrument(skip(self), fields(routes = self.routes.len()))]
    pub async fn run(&self) -> WarmupReport {
        let timestamp = OffsetDateTime::now_utc();
        let started = Instant::now();

        let mut results = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            results.push(self.ping(route).await);
        }

        let report = WarmupReport { timestamp, total_duration: started.elapsed(), results };
        tracing::info!(
            total_ms = %report.total_duration.as_millis(),
            succeeded = report.results.iter().filter(|r| r.success).count(),
            "Warmup completed"
        );
        report
    }

    async fn ping(&self, route: &str) -> RouteResult {
        let url = if route.starts_with("http://") || route.starts_with("https://") {
            route.to_string()
        } else {
            format!("{}/{}", self.base_url, route.trim_start_matches('/'))
        };

        let started = Instant::now();
        let outcome = self.client.get(&url).header(WARMUP_HEADER, "1").send().await;
        let duration = started.elapsed();

        let result = match outcome {
            Ok(response) => {
                let status = response.status();
                RouteResult {
                    route: route.to_string(),
                    success: status.is_success(),
                    status_code: Some(status.as_u16()),
                    duration,
                    error: (!status.is_success()).then(|| format!("unexpected status {status}")),
                }
            }
            Err(e) => {
                tracing::warn!(route, error = %e, "Warmup ping failed");
                RouteResult { route: route.to_string(), success: false, status_code: None, duration, error: Some(e.to_string()) }
            }
        };

        self.metrics.route_duration_seconds.record(
            duration.as_secs_f64(),
            &[KeyValue::new("route", route.to_string()), KeyValue::new("success", result.success)],
        );
        result
    }
}
