//! Background sweeping of expired records.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::limiter::RateLimiter;

/// Shortest period accepted for background tasks; `tokio::time::interval`
/// panics on a zero period.
pub(crate) const MIN_TASK_INTERVAL: Duration = Duration::from_millis(1);

/// Raise `interval` to [`MIN_TASK_INTERVAL`] if it is shorter.
pub(crate) fn task_interval(interval: Duration, task: &str) -> Duration {
    if interval < MIN_TASK_INTERVAL {
        warn!(task, ?interval, "Interval too short, using {:?}", MIN_TASK_INTERVAL);
        MIN_TASK_INTERVAL
    } else {
        interval
    }
}

/// Handle to a running sweeper task.
///
/// Sweeping only bounds memory; the limiter already treats expired records
/// as absent, so a stopped sweeper never affects decisions.
pub struct Sweeper {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn a task that sweeps `limiter` every `interval`.
    ///
    /// A zero interval is raised to one millisecond.
    pub fn spawn(limiter: Arc<RateLimiter>, interval: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = oneshot::channel();
        let interval = task_interval(interval, "sweeper");

        info!(interval_ms = interval.as_millis() as u64, "Starting rate limit sweeper");

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        debug!(removed, remaining = limiter.record_count(), "Sweep completed");
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Self { shutdown, task }
    }

    /// Stop the sweeper and wait for the task to finish.
    pub async fn shutdown(self) {
        // The task may already be gone if the runtime is shutting down.
        let _ = self.shutdown.send(());
        match self.task.await {
            Ok(()) => info!("Rate limit sweeper stopped"),
            Err(e) => warn!(error = %e, "Rate limit sweeper task failed"),
        }
    }
}
