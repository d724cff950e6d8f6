use crate::services::warmup_service::WarmupService;
use std::time::Duration;
use tracing::Instrument;

/// Runs the warmup sequence on a fixed schedule.
#[derive(Debug)]
pub struct WarmupWorker {
    service: WarmupService,
    interval_secs: u64,
}

impl WarmupWorker {
    #[must_use]
    pub const fn new(service: WarmupService, interval_secs: u64) -> Self {
        Self { service, interval_secs }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if self.interval_secs == 0 {
            tracing::info!("Scheduled warmup is disabled (interval = 0)");
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The listener is not accepting yet on the immediate first tick.
        interval.tick().await;

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.service.run().instrument(tracing::info_span!("scheduled_warmup")).await;
                    if !report.all_succeeded() {
                        tracing::warn!(
                            failed = report.results.iter().filter(|r| !r.success).count(),
                            "Scheduled warmup had failing routes"
                        );
                    }
                }
                res = shutdown.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Warmup loop shutting down...");
    }
}
