use std::sync::Arc;

use axum::{routing::get, Router};

use super::handlers::get_rate_limit_status;
use super::services::RateLimiter;

/// Create routes for the rate limit status endpoint
pub fn routes(rate_limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .route("/ratelimit", get(get_rate_limit_status))
        .with_state(rate_limiter)
}
