use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use thiserror::Error;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub backend: BackendConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub routes: RouteConfig,

    #[command(flatten)]
    pub warmup: WarmupConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Preview,
    Production,
}

impl Environment {
    /// Anything other than a local development run is a hosted deployment.
    #[must_use]
    pub const fn is_hosted(self) -> bool {
        !matches!(self, Self::Development)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Preview => "preview",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "FLEETDESK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "FLEETDESK_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management server (health checks)
    #[arg(long, env = "FLEETDESK_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Deployment environment
    #[arg(long = "environment", env = "FLEETDESK_ENV", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    /// Directory holding the pre-built back-office UI
    #[arg(long, env = "FLEETDESK_STATIC_DIR")]
    pub static_dir: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "FLEETDESK_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// How long to wait for background tasks during shutdown
    #[arg(long, env = "FLEETDESK_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "FLEETDESK_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Debug, Args)]
pub struct BackendConfig {
    /// Public base URL of the hosted backend
    #[arg(long = "api-url", env = "FLEETDESK_API_URL")]
    pub api_url: Option<String>,

    /// Public (anonymous) API key of the hosted backend
    #[arg(long = "api-key", env = "FLEETDESK_API_KEY")]
    pub api_key: Option<String>,
}

/// Validated connection settings for the hosted backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendCredentials {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    MissingBackend(Vec<&'static str>),
}

impl BackendConfig {
    /// Validates the backend settings for the given environment.
    ///
    /// Returns `Ok(None)` when values are missing in a hosted deployment; the
    /// caller keeps running without a reachable identity provider.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingBackend` when values are missing in local development.
    pub fn resolve(&self, environment: Environment) -> Result<Option<BackendCredentials>, ConfigError> {
        let api_url = self.api_url.as_deref().map(str::trim).filter(|v| !v.is_empty());
        let api_key = self.api_key.as_deref().map(str::trim).filter(|v| !v.is_empty());

        let mut missing = Vec::new();
        if api_url.is_none() {
            missing.push("FLEETDESK_API_URL");
        }
        if api_key.is_none() {
            missing.push("FLEETDESK_API_KEY");
        }

        match (api_url, api_key) {
            (Some(url), Some(key)) => Ok(Some(BackendCredentials {
                api_url: url.trim_end_matches('/').to_string(),
                api_key: key.to_string(),
            })),
            _ if environment.is_hosted() => {
                tracing::warn!(
                    missing = %missing.join(", "),
                    environment = %environment,
                    "Backend configuration incomplete, sessions will not validate"
                );
                Ok(None)
            }
            _ => Err(ConfigError::MissingBackend(missing)),
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Timeout for a single identity provider request in milliseconds
    #[arg(long, env = "FLEETDESK_PROVIDER_TIMEOUT_MS", default_value_t = 5000)]
    pub provider_timeout_ms: u64,

    /// Retries on transport failures when talking to the identity provider
    #[arg(long, env = "FLEETDESK_PROVIDER_MAX_RETRIES", default_value_t = 2)]
    pub provider_max_retries: usize,

    /// Lifetime of the refresh token cookie in days
    #[arg(long, env = "FLEETDESK_REFRESH_COOKIE_TTL_DAYS", default_value_t = 30)]
    pub refresh_cookie_ttl_days: i64,

    /// How often expired entries are swept from the session cache
    #[arg(long, env = "FLEETDESK_SESSION_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub session_sweep_interval_secs: u64,

    /// Seconds a provider-confirmed session is trusted from the cache before
    /// it is checked again (0 asks the provider on every request)
    #[arg(long, env = "FLEETDESK_SESSION_REVALIDATE_SECS", default_value_t = 15)]
    pub session_revalidate_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RouteConfig {
    /// Path of the login page
    #[arg(long, env = "FLEETDESK_LOGIN_PATH", default_value = "/login")]
    pub login_path: String,

    /// Landing page for authenticated users
    #[arg(long, env = "FLEETDESK_DASHBOARD_PATH", default_value = "/dashboard")]
    pub dashboard_path: String,

    /// Comma-separated path prefixes that require a session
    #[arg(long, env = "FLEETDESK_PROTECTED_PREFIXES", default_value = "/dashboard", value_delimiter = ',')]
    pub protected_prefixes: Vec<String>,

    /// Comma-separated path prefixes the route guard never intercepts
    #[arg(
        long,
        env = "FLEETDESK_EXCLUDED_PREFIXES",
        default_value = "/assets/,/_image,/favicon.ico,/auth/,/_app/",
        value_delimiter = ','
    )]
    pub excluded_prefixes: Vec<String>,
}

#[derive(Clone, Debug, Args)]
pub struct WarmupConfig {
    /// Comma-separated list of routes pinged by the warmup endpoint
    #[arg(long = "warmup-routes", env = "FLEETDESK_WARMUP_ROUTES", default_value = "/api/health", value_delimiter = ',')]
    pub routes: Vec<String>,

    /// Base URL used to reach this server's own routes (defaults to the local listener)
    #[arg(long = "warmup-base-url", env = "FLEETDESK_WARMUP_BASE_URL")]
    pub base_url: Option<String>,

    /// Timeout for a single warmup ping in milliseconds
    #[arg(long = "warmup-timeout-ms", env = "FLEETDESK_WARMUP_TIMEOUT_MS", default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Run the warmup sequence in the background every N seconds (0 disables)
    #[arg(long = "warmup-interval-secs", env = "FLEETDESK_WARMUP_INTERVAL_SECS", default_value_t = 0)]
    pub interval_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Login attempts per second allowed per client
    #[arg(long, env = "FLEETDESK_LOGIN_RATE_LIMIT_PER_SECOND", default_value_t = 1)]
    pub login_per_second: u32,

    /// Burst allowance for login attempts
    #[arg(long, env = "FLEETDESK_LOGIN_RATE_LIMIT_BURST", default_value_t = 5)]
    pub login_burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the identity provider readiness check in milliseconds
    #[arg(
        id = "health_provider_timeout_ms",
        long = "health-provider-timeout-ms",
        env = "FLEETDESK_HEALTH_PROVIDER_TIMEOUT_MS",
        default_value_t = 2000
    )]
    pub provider_timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "FLEETDESK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; traces and metrics are exported when set
    #[arg(long, env = "FLEETDESK_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }

    /// The base URL the warmup service uses for its pings. Without an explicit
    /// value it points at the API listener, using loopback when bound to a
    /// wildcard address.
    #[must_use]
    pub fn warmup_base_url(&self) -> String {
        if let Some(url) = self.warmup.base_url.as_deref() {
            return url.trim_end_matches('/').to_string();
        }

        let host = self.server.host.trim();
        match host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
            Ok(ip) if ip.is_unspecified() => {
                let loopback = if ip.is_ipv4() { IpAddr::V4(Ipv4Addr::LOCALHOST) } else { IpAddr::V6(Ipv6Addr::LOCALHOST) };
                format!("http://{}", SocketAddr::new(loopback, self.server.port))
            }
            Ok(ip) => format!("http://{}", SocketAddr::new(ip, self.server.port)),
            Err(_) => format!("http://{host}:{}", self.server.port),
        }
    }
}
