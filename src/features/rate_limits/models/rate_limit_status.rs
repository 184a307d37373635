use super::Window;

/// Limit and live count for one enabled window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUsage {
    pub window: Window,
    pub limit: u64,
    pub used: u64,
}

impl WindowUsage {
    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

/// Point-in-time view of the rate limiter. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitStatus {
    Disabled,
    Enabled {
        hourly: Option<WindowUsage>,
        daily: Option<WindowUsage>,
    },
}
