use serde::Serialize;
use utoipa::ToSchema;

use crate::features::rate_limits::models::RateLimitStatus;

pub const RATE_LIMIT_DISABLED_MESSAGE: &str = "Rate limit is not enabled.";

/// Response DTO for the rate limit status endpoint.
///
/// Only enabled windows appear. When rate limiting is off, `enabled` is
/// false and `message` says so explicitly.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RateLimitStatusDto {
    pub enabled: bool,
    /// Maximum requests in the trailing hour
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_limit: Option<u64>,
    /// Requests recorded in the trailing hour
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_api_usage: Option<u64>,
    /// Maximum requests in the trailing day
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_limit: Option<u64>,
    /// Requests recorded in the trailing day
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_api_usage: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<RateLimitStatus> for RateLimitStatusDto {
    fn from(status: RateLimitStatus) -> Self {
        match status {
            RateLimitStatus::Disabled => Self {
                enabled: false,
                hourly_limit: None,
                hourly_api_usage: None,
                daily_limit: None,
                daily_api_usage: None,
                message: Some(RATE_LIMIT_DISABLED_MESSAGE.to_string()),
            },
            RateLimitStatus::Enabled { hourly, daily } => Self {
                enabled: true,
                hourly_limit: hourly.map(|w| w.limit),
                hourly_api_usage: hourly.map(|w| w.used),
                daily_limit: daily.map(|w| w.limit),
                daily_api_usage: daily.map(|w| w.used),
                message: None,
            },
        }
    }
}
