use crate::adapters::identity::IdentityProvider;
use crate::config::{Environment, HealthConfig};
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("fleetdesk");
        Self {
            status: meter
                .i64_gauge("fleetdesk_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot returned by the liveness endpoint.
#[derive(Debug, Clone)]
pub struct Liveness {
    pub timestamp: OffsetDateTime,
    pub uptime: Duration,
    pub environment: Environment,
    pub version: &'static str,
}

#[derive(Clone, Debug)]
pub struct HealthService {
    started_at: Instant,
    environment: Environment,
    provider: Arc<dyn IdentityProvider>,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(environment: Environment, provider: Arc<dyn IdentityProvider>, config: HealthConfig) -> Self {
        Self { started_at: Instant::now(), environment, provider, config, metrics: Metrics::new() }
    }

    /// Uptime comes from a monotonic clock, so it never goes backwards.
    #[must_use]
    pub fn liveness(&self) -> Liveness {
        Liveness {
            timestamp: OffsetDateTime::now_utc(),
            uptime: self.started_at.elapsed(),
            environment: self.environment,
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Checks identity provider connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the provider is unreachable.
    pub async fn check_provider(&self) -> Result<(), String> {
        let provider_timeout = Duration::from_millis(self.config.provider_timeout_ms);

        match timeout(provider_timeout, self.provider.ping()).await {
            Ok(Ok(())) => {
                self.metrics.status.record(1, &[KeyValue::new("component", "identity_provider")]);
                Ok(())
            }
            Ok(Err(e)) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "identity_provider")]);
                Err(format!("Identity provider check failed: {e}"))
            }
            Err(_) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "identity_provider")]);
                Err("Identity provider check timed out".to_string())
            }
        }
    }
}
