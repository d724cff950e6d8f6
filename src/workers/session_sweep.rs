use crate::services::session_store::SessionStore;
use std::time::Duration;
use time::OffsetDateTime;

/// Drops cached sessions whose expiry has passed, so entries nobody asks for
/// again do not pile up.
#[derive(Debug)]
pub struct SessionSweepWorker {
    store: SessionStore,
    sweep_interval_secs: u64,
}

impl SessionSweepWorker {
    #[must_use]
    pub const fn new(store: SessionStore, sweep_interval_secs: u64) -> Self {
        Self { store, sweep_interval_secs }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if self.sweep_interval_secs == 0 {
            tracing::info!("Session sweep is disabled (interval = 0)");
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.sweep_interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep();
                }
                res = shutdown.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Session sweep loop shutting down...");
    }

    #[tracing::instrument(name = "session_sweep_iteration", skip(self), fields(expired_removed = tracing::field::Empty))]
    pub fn sweep(&self) -> usize {
        let removed = self.store.purge_expired_at(OffsetDateTime::now_utc());
        if removed > 0 {
            tracing::info!(count = %removed, remaining = self.store.len(), "Removed expired cached sessions");
            tracing::Span::current().record("expired_removed", removed);
        }
        removed
    }
}
