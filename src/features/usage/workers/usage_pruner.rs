use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};

use crate::core::error::Result;
use crate::features::rate_limits::RateLimiter;
use crate::features::usage::UsageStore;

/// Background worker that keeps the usage log bounded by deleting records
/// older than the longest enabled window.
pub struct UsagePruner {
    store: Arc<UsageStore>,
    rate_limiter: Arc<RateLimiter>,
    every: Duration,
}

impl UsagePruner {
    pub fn new(store: Arc<UsageStore>, rate_limiter: Arc<RateLimiter>, every: Duration) -> Self {
        Self {
            store,
            rate_limiter,
            every,
        }
    }

    /// Run the pruner in a background loop
    pub async fn run(&self) {
        tracing::info!(
            "Starting usage pruner worker (every {}s)",
            self.every.as_secs()
        );

        let mut interval = interval(self.every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            if let Err(e) = self.prune_at(Utc::now().timestamp()).await {
                tracing::error!("Error pruning usage log: {:?}", e);
            }
        }
    }

    /// Delete every record that can no longer fall inside any enabled window.
    pub async fn prune_at(&self, now: i64) -> Result<u64> {
        let Some(cutoff) = self.rate_limiter.retention_cutoff(now) else {
            return Ok(0);
        };

        let deleted = self.store.prune_older_than(cutoff).await?;
        if deleted > 0 {
            tracing::info!("Pruned {} usage records at or before {}", deleted, cutoff);
        }

        Ok(deleted)
    }
}
