use crate::domain::activity::ActivityEvent;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::Instrument;

/// Something that can push a session's expiry out.
#[async_trait]
pub trait SessionExtender: Send + Sync + Debug {
    /// Whether the caller currently holds a session worth extending.
    fn is_authenticated(&self) -> bool;

    /// Asks for a longer-lived session. Returns `false` once the caller is no
    /// longer authenticated.
    async fn extend(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivitySettings {
    pub quiescence: Duration,
    pub min_extension_interval: Duration,
    pub buffer_size: usize,
}

/// One second of quiet per burst and at most one extension every five minutes.
impl Default for ActivitySettings {
    fn default() -> Self {
        Self { quiescence: Duration::from_secs(1), min_extension_interval: Duration::from_secs(300), buffer_size: 64 }
    }
}

#[derive(Debug, Default)]
struct Counters {
    events: AtomicU64,
    dropped: AtomicU64,
    signals: AtomicU64,
    extension_attempts: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivityStats {
    pub events: u64,
    pub dropped: u64,
    pub signals: u64,
    pub extension_attempts: u64,
}

/// `ActivityTracker` turns a stream of interaction events into occasional
/// session extensions.
///
/// Bursts collapse into one activity signal once the quiescence window passes
/// without a new event; each new event pushes the single pending deadline
/// back. A signal escalates to `SessionExtender::extend` only when the minimum
/// interval has elapsed since the previous attempt. Dropping the tracker stops
/// the background task and discards any pending deadline.
#[derive(Debug)]
pub struct ActivityTracker {
    tx: mpsc::Sender<ActivityEvent>,
    counters: Arc<Counters>,
}

impl ActivityTracker {
    #[must_use]
    pub fn spawn(settings: ActivitySettings, extender: Arc<dyn SessionExtender>) -> Self {
        let (tx, rx) = mpsc::channel(settings.buffer_size);
        let counters = Arc::new(Counters::default());

        let task_counters = Arc::clone(&counters);
        tokio::spawn(
            async move {
                Self::run_background(rx, settings, extender, task_counters).await;
            }
            .instrument(tracing::info_span!("activity_tracker")),
        );

        Self { tx, counters }
    }

    pub fn record(&self, event: ActivityEvent) {
        self.counters.events.fetch_add(1, Ordering::Relaxed);
        if self.tx.try_send(event).is_err() {
            tracing::warn!(event = %event, "Dropped activity event due to full buffer");
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn stats(&self) -> ActivityStats {
        ActivityStats {
            events: self.counters.events.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            signals: self.counters.signals.load(Ordering::Relaxed),
            extension_attempts: self.counters.extension_attempts.load(Ordering::Relaxed),
        }
    }

    async fn run_background(
        mut rx: mpsc::Receiver<ActivityEvent>,
        settings: ActivitySettings,
        extender: Arc<dyn SessionExtender>,
        counters: Arc<Counters>,
    ) {
        // The one and only timer. Rescheduling resets it in place.
        let quiet = tokio::time::sleep(settings.quiescence);
        tokio::pin!(quiet);
        let mut armed = false;
        let mut last_attempt: Option<Instant> = None;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else {
                        tracing::debug!("Activity tracker shutting down");
                        return;
                    };

                    if !extender.is_authenticated() {
                        tracing::trace!(event = %event, "Ignoring activity while unauthenticated");
                        continue;
                    }

                    quiet.as_mut().reset(Instant::now() + settings.quiescence);
                    armed = true;
                }
                () = &mut quiet, if armed => {
                    armed = false;
                    counters.signals.fetch_add(1, Ordering::Relaxed);

                    let now = Instant::now();
                    let due = last_attempt
                        .is_none_or(|at| now.duration_since(at) >= settings.min_extension_interval);
                    if !due || !extender.is_authenticated() {
                        continue;
                    }

                    last_attempt = Some(now);
                    counters.extension_attempts.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Extending session after activity");
                    if !extender.extend().await {
                        tracing::info!("Session could not be extended, waiting for a new sign-in");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tokio::time::sleep;

    #[derive(Debug)]
    struct CountingExtender {
        authenticated: AtomicBool,
        succeed: AtomicBool,
        calls: AtomicUsize,
    }

    impl CountingExtender {
        fn new(authenticated: bool) -> Arc<Self> {
            Arc::new(Self {
                authenticated: AtomicBool::new(authenticated),
                succeed: AtomicBool::new(true),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionExtender for CountingExtender {
        fn is_authenticated(&self) -> bool {
            self.authenticated.load(Ordering::SeqCst)
        }

        async fn extend(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ok = self.succeed.load(Ordering::SeqCst);
            self.authenticated.store(ok, Ordering::SeqCst);
            ok
        }
    }

    fn settings() -> ActivitySettings {
        ActivitySettings::default()
    }

    #[test]
    fn test_default_settings() {
        let settings = ActivitySettings::default();
        assert_eq!(settings.quiescence, Duration::from_secs(1));
        assert_eq!(settings.min_extension_interval, Duration::from_secs(300));
        assert_eq!(settings.buffer_size, 64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_extension() {
        let extender = CountingExtender::new(true);
        let tracker = ActivityTracker::spawn(settings(), extender.clone());

        for event in ActivityEvent::ALL.iter().cycle().take(10) {
            tracker.record(*event);
            sleep(Duration::from_millis(50)).await;
        }
        sleep(Duration::from_secs(2)).await;

        assert_eq!(extender.calls(), 1);
        let stats = tracker.stats();
        assert_eq!(stats.events, 10);
        assert_eq!(stats.signals, 1);
        assert_eq!(stats.extension_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_event_reschedules_the_pending_deadline() {
        let extender = CountingExtender::new(true);
        let tracker = ActivityTracker::spawn(settings(), extender.clone());

        // Events 900ms apart never leave a full quiet second between them.
        for _ in 0..5 {
            tracker.record(ActivityEvent::KeyDown);
            sleep(Duration::from_millis(900)).await;
            assert_eq!(tracker.stats().signals, 0);
        }

        sleep(Duration::from_millis(200)).await;
        assert_eq!(tracker.stats().signals, 1);
        assert_eq!(extender.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_further_apart_than_min_interval_extend_twice() {
        let extender = CountingExtender::new(true);
        let tracker = ActivityTracker::spawn(settings(), extender.clone());

        tracker.record(ActivityEvent::PointerDown);
        sleep(Duration::from_secs(301)).await;
        tracker.record(ActivityEvent::PointerDown);
        sleep(Duration::from_secs(2)).await;

        assert_eq!(tracker.stats().signals, 2);
        assert_eq!(extender.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_closer_than_min_interval_extend_once() {
        let extender = CountingExtender::new(true);
        let tracker = ActivityTracker::spawn(settings(), extender.clone());

        tracker.record(ActivityEvent::Scroll);
        sleep(Duration::from_secs(120)).await;
        tracker.record(ActivityEvent::Scroll);
        sleep(Duration::from_secs(2)).await;

        assert_eq!(tracker.stats().signals, 2);
        assert_eq!(extender.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthenticated_caller_is_ignored() {
        let extender = CountingExtender::new(false);
        let tracker = ActivityTracker::spawn(settings(), extender.clone());

        tracker.record(ActivityEvent::TouchStart);
        sleep(Duration::from_secs(5)).await;

        assert_eq!(tracker.stats().signals, 0);
        assert_eq!(extender.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_extension_stops_escalation() {
        let extender = CountingExtender::new(true);
        extender.succeed.store(false, Ordering::SeqCst);
        let tracker = ActivityTracker::spawn(settings(), extender.clone());

        tracker.record(ActivityEvent::KeyDown);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(extender.calls(), 1);

        tracker.record(ActivityEvent::KeyDown);
        sleep(Duration::from_secs(400)).await;
        assert_eq!(extender.calls(), 1);
        assert_eq!(tracker.stats().signals, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_buffer_drops_events() {
        let extender = CountingExtender::new(true);
        let tracker = ActivityTracker::spawn(ActivitySettings { buffer_size: 2, ..settings() }, extender);

        // No await in between, so the background task cannot drain the channel.
        for _ in 0..5 {
            tracker.record(ActivityEvent::MouseMove);
        }
        assert_eq!(tracker.stats().dropped, 3);
    }
}
