//! Periodic reclamation of expired sessions and stale rate-limit windows.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::observability::EventSink;
use crate::sessions::SessionStore;
use crate::throttle::RateLimiter;

/// Background unit that sweeps expired session records and stale limiter
/// counters on a fixed interval, independent of request handling.
pub struct Reclaimer {
    store: Arc<dyn SessionStore>,
    limiter: Arc<dyn RateLimiter>,
    sink: Arc<dyn EventSink>,
    interval: Duration,
}

impl Reclaimer {
    pub fn new(
        store: Arc<dyn SessionStore>,
        limiter: Arc<dyn RateLimiter>,
        sink: Arc<dyn EventSink>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            limiter,
            sink,
            interval,
        }
    }

    /// One sweep: snapshot the expired candidates, remove the ones still
    /// expired, evict stale limiter windows, and report the counts.
    ///
    /// Only the per-id removal holds the store lock; the candidate list is
    /// walked outside of it.
    pub async fn run_once(&self) -> usize {
        let candidates = self.store.expired_ids().await;
        let mut removed = 0usize;
        for id in &candidates {
            if self.store.remove_if_expired(id).await {
                removed += 1;
            }
        }
        let evicted = self.limiter.evict_stale();
        self.sink.record_event(
            "sessions_reclaimed",
            &[
                ("count", removed.to_string()),
                ("rate_windows_evicted", evicted.to_string()),
            ],
        );
        removed
    }

    /// Start the periodic sweep on the current tokio runtime.
    ///
    /// Called from the serve path once the runtime is live, never at
    /// construction or static-init time.
    pub fn spawn(self) -> ReclaimerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let reclaimer = Arc::new(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reclaimer.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // An interval's first tick completes immediately; consume it so
            // the first sweep lands one full interval after startup.
            ticker.tick().await;
            info!(
                interval_secs = reclaimer.interval.as_secs(),
                "reclaimer started"
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // A sweep runs as its own task: a panic ends that
                        // sweep, not the schedule.
                        let run = Arc::clone(&reclaimer);
                        match tokio::spawn(async move { run.run_once().await }).await {
                            Ok(removed) => debug!(removed, "sweep complete"),
                            Err(err) => {
                                warn!(error = %err, "sweep aborted");
                                reclaimer
                                    .sink
                                    .record_event("reclaim_failed", &[("error", err.to_string())]);
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("reclaimer stopped");
        });
        ReclaimerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running reclaimer task.
pub struct ReclaimerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReclaimerHandle {
    /// Cooperative stop: no further sweeps are scheduled, an in-flight
    /// sweep finishes, and the task is joined.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "reclaimer task ended abnormally");
        }
    }
}
