#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::identity::{GoTrueProvider, IdentityProvider, UnavailableProvider};
use crate::api::ServiceContainer;
use crate::config::Config;
use crate::services::auth_reconciler::AuthReconciler;
use crate::services::health_service::HealthService;
use crate::services::route_guard::RouteGuard;
use crate::services::session_store::SessionStore;
use crate::services::warmup_service::WarmupService;
use crate::workers::{SessionSweepWorker, WarmupWorker};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Background loops owned by the application.
#[derive(Debug)]
pub struct Workers {
    pub session_sweep: SessionSweepWorker,
    pub warmup: WarmupWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.session_sweep.run(shutdown_rx.clone()).instrument(tracing::info_span!("session_sweep"))),
            tokio::spawn(self.warmup.run(shutdown_rx).instrument(tracing::info_span!("warmup_worker"))),
        ]
    }
}

#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
    pub workers: Workers,
}

/// Wires the services from configuration. The identity provider can be
/// swapped out, which is how tests run without a hosted backend.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    provider: Option<Arc<dyn IdentityProvider>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, provider: None }
    }

    #[must_use]
    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// # Errors
    /// Returns an error when backend configuration is missing in local
    /// development or an HTTP client cannot be built.
    pub fn build(self) -> anyhow::Result<App> {
        let config = self.config;
        let environment = config.server.environment;

        let provider: Arc<dyn IdentityProvider> = match self.provider {
            Some(provider) => provider,
            None => match config.backend.resolve(environment)? {
                Some(credentials) => Arc::new(GoTrueProvider::new(&credentials, &config.auth)?),
                None => Arc::new(UnavailableProvider),
            },
        };

        let store = SessionStore::new();
        let revalidate_secs = i64::try_from(config.auth.session_revalidate_secs).unwrap_or(i64::MAX);
        let reconciler = AuthReconciler::new(Arc::clone(&provider), store.clone())
            .with_revalidation(time::Duration::seconds(revalidate_secs));
        let health_service = HealthService::new(environment, provider, config.health.clone());
        let warmup_service = WarmupService::new(&config.warmup, config.warmup_base_url())?;

        let workers = Workers {
            session_sweep: SessionSweepWorker::new(store, config.auth.session_sweep_interval_secs),
            warmup: WarmupWorker::new(warmup_service.clone(), config.warmup.interval_secs),
        };

        let services = ServiceContainer {
            reconciler,
            route_guard: RouteGuard::new(&config.routes),
            health_service: health_service.clone(),
            warmup_service,
        };

        Ok(App { services, health_service, workers })
    }
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received, draining connections...");
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through tracing so they reach the structured log.
pub fn setup_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        tracing::error!(panic = %info, location = %location, "Panic occurred");
        default_hook(info);
    }));
}
