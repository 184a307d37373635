use std::sync::Arc;

use axum::{extract::State, Json};

use crate::core::error::Result;
use crate::features::rate_limits::dtos::RateLimitStatusDto;
use crate::features::rate_limits::services::RateLimiter;
use crate::shared::types::ApiResponse;

/// View the current rate limit status and settings
#[utoipa::path(
    get,
    path = "/ratelimit",
    responses(
        (status = 200, description = "Rate limit status", body = ApiResponse<RateLimitStatusDto>),
        (status = 401, description = "Missing or invalid API key"),
        (status = 500, description = "Usage log unavailable")
    ),
    tag = "rate-limits",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_rate_limit_status(
    State(rate_limiter): State<Arc<RateLimiter>>,
) -> Result<Json<ApiResponse<RateLimitStatusDto>>> {
    let status = rate_limiter.status().await?;
    Ok(Json(ApiResponse::success(Some(status.into()), None)))
}
