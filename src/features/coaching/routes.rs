use std::sync::Arc;

use axum::{routing::post, Router};

use crate::features::coaching::handlers;
use crate::features::coaching::services::CoachingService;

pub fn routes(service: Arc<CoachingService>) -> Router {
    Router::new()
        .route(
            "/api/openai/joycoachgpt",
            post(handlers::create_coaching_completion),
        )
        .with_state(service)
}
