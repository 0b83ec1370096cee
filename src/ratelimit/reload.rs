//! Reloading rate limit rules from disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::limiter::RateLimiter;
use super::rules::RuleSet;
use super::sweeper::task_interval;
use crate::error::Result;

/// Re-read the rules file and apply it if it changed.
///
/// Returns `true` when new rules were applied. On error the current rules
/// stay in place.
pub fn reload_rules(limiter: &RateLimiter, path: &Path) -> Result<bool> {
    let rules = RuleSet::from_file(path)?;
    if *limiter.rules() == rules {
        debug!(path = %path.display(), "Rate limit rules unchanged");
        return Ok(false);
    }

    limiter.set_rules(rules);
    Ok(true)
}

/// Spawn a task that calls [`reload_rules`] every `interval`.
///
/// Failed reloads are logged and retried on the next tick. A zero interval
/// is raised to one millisecond.
pub fn spawn_rules_reloader(
    limiter: Arc<RateLimiter>,
    path: PathBuf,
    interval: Duration,
) -> JoinHandle<()> {
    let interval = task_interval(interval, "rules reloader");
    info!(
        path = %path.display(),
        interval_ms = interval.as_millis() as u64,
        "Watching rate limit rules"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match reload_rules(&limiter, &path) {
                Ok(true) => info!(path = %path.display(), "Reloaded rate limit rules"),
                Ok(false) => {}
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to reload rate limit rules, keeping current rules"
                ),
            }
        }
    })
}
