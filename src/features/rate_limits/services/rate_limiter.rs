use std::sync::Arc;

use chrono::Utc;

use crate::core::config::RateLimitConfig;
use crate::core::error::{AppError, Result};
use crate::features::rate_limits::models::{
    EnforcementMode, RateLimitStatus, RecordUsageOn, Window, WindowUsage,
};
use crate::features::usage::UsageStore;

/// Message returned with every 429
pub const RATE_LIMIT_EXCEEDED_MESSAGE: &str =
    "Rate limit reached. Try again later. See /ratelimit to view status and settings.";

/// What is still owed to the usage log once the request has been served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Admission {
    /// Usage already recorded, or nothing to record
    Settled,
    /// Record usage after the upstream call succeeds
    RecordOnSuccess,
}

/// Translates usage counts into allow/deny decisions.
///
/// Holds no state of its own between calls; every decision re-reads the
/// usage log.
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<UsageStore>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: Arc<UsageStore>) -> Self {
        Self { config, store }
    }

    #[allow(dead_code)]
    pub async fn is_allowed(&self) -> Result<bool> {
        self.is_allowed_at(now()).await
    }

    /// Hourly is checked before daily; the first exhausted window denies.
    /// With no window enabled every request is allowed.
    pub async fn is_allowed_at(&self, now: i64) -> Result<bool> {
        for window in Window::ALL {
            let Some(usage) = self.window_usage(window, now).await? else {
                continue;
            };
            if usage.is_exhausted() {
                tracing::debug!(
                    "{} rate limit reached: {}/{}",
                    window,
                    usage.used,
                    usage.limit
                );
                return Ok(false);
            }
        }

        Ok(true)
    }

    #[allow(dead_code)]
    pub async fn try_acquire(&self) -> Result<bool> {
        self.try_acquire_at(now()).await
    }

    /// Check every enabled window and record `now` in one atomic step.
    pub async fn try_acquire_at(&self, now: i64) -> Result<bool> {
        if !self.config.is_enabled() {
            return Ok(true);
        }

        let windows: Vec<(i64, u64)> = self
            .config
            .enabled_windows()
            .map(|(window, limit)| (window.cutoff(now), limit))
            .collect();

        let acquired = self.store.record_if_under_limits(now, &windows).await?;
        if !acquired {
            tracing::debug!("Rate limit reached, strict acquisition refused");
        }

        Ok(acquired)
    }

    /// Admit a request according to the configured enforcement mode.
    ///
    /// Returns `RateLimitExceeded` when a window is exhausted. In strict mode
    /// and in soft mode with `RecordUsageOn::Attempt` the usage is recorded
    /// here; otherwise the caller must pass the admission to [`Self::settle`]
    /// once the request has succeeded.
    pub async fn admit_at(&self, now: i64) -> Result<Admission> {
        if !self.config.is_enabled() {
            return Ok(Admission::Settled);
        }

        match self.config.mode {
            EnforcementMode::Strict => {
                if !self.try_acquire_at(now).await? {
                    return Err(rate_limit_exceeded());
                }
                Ok(Admission::Settled)
            }
            EnforcementMode::Soft => {
                if !self.is_allowed_at(now).await? {
                    return Err(rate_limit_exceeded());
                }
                match self.config.record_on {
                    RecordUsageOn::Attempt => {
                        self.record_usage_at(now).await?;
                        Ok(Admission::Settled)
                    }
                    RecordUsageOn::Success => Ok(Admission::RecordOnSuccess),
                }
            }
        }
    }

    pub async fn admit(&self) -> Result<Admission> {
        self.admit_at(now()).await
    }

    /// Record usage still owed by a successful request.
    pub async fn settle(&self, admission: Admission) -> Result<()> {
        self.settle_at(admission, now()).await
    }

    pub async fn settle_at(&self, admission: Admission, now: i64) -> Result<()> {
        match admission {
            Admission::Settled => Ok(()),
            Admission::RecordOnSuccess => self.record_usage_at(now).await,
        }
    }

    #[allow(dead_code)]
    pub async fn record_usage(&self) -> Result<()> {
        self.record_usage_at(now()).await
    }

    /// Append `now` to the usage log. Nothing is written while rate limiting
    /// is off.
    pub async fn record_usage_at(&self, now: i64) -> Result<()> {
        if !self.config.is_enabled() {
            return Ok(());
        }
        self.store.record(now).await
    }

    pub async fn status(&self) -> Result<RateLimitStatus> {
        self.status_at(now()).await
    }

    /// Read-only snapshot of every enabled window.
    pub async fn status_at(&self, now: i64) -> Result<RateLimitStatus> {
        if !self.config.is_enabled() {
            return Ok(RateLimitStatus::Disabled);
        }

        let hourly = self.window_usage(Window::Hourly, now).await?;
        let daily = self.window_usage(Window::Daily, now).await?;

        Ok(RateLimitStatus::Enabled { hourly, daily })
    }

    async fn window_usage(&self, window: Window, now: i64) -> Result<Option<WindowUsage>> {
        let Some(limit) = self.config.limit_for(window) else {
            return Ok(None);
        };

        let used = self.store.count_since(window.cutoff(now)).await?;
        Ok(Some(WindowUsage {
            window,
            limit,
            used,
        }))
    }

    /// Records at or before this timestamp cannot affect any decision.
    pub fn retention_cutoff(&self, now: i64) -> Option<i64> {
        self.config
            .enabled_windows()
            .map(|(window, _)| window.cutoff(now))
            .min()
    }
}

fn rate_limit_exceeded() -> AppError {
    AppError::RateLimitExceeded(RATE_LIMIT_EXCEEDED_MESSAGE.to_string())
}

fn now() -> i64 {
    Utc::now().timestamp()
}
