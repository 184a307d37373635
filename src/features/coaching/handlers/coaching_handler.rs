use std::sync::Arc;

use axum::{extract::State, Json};
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppQuery;
use crate::features::coaching::dtos::{CoachingQueryDto, CoachingResponseDto};
use crate::features::coaching::services::CoachingService;
use crate::shared::types::ApiResponse;

/// Get coaching for a described situation
#[utoipa::path(
    post,
    path = "/api/openai/joycoachgpt",
    params(CoachingQueryDto),
    responses(
        (status = 200, description = "Coaching completion", body = ApiResponse<CoachingResponseDto>),
        (status = 400, description = "Missing or empty message"),
        (status = 401, description = "Invalid API key"),
        (status = 429, description = "Rate limit reached"),
        (status = 502, description = "Upstream model failed")
    ),
    tag = "coaching",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_coaching_completion(
    State(service): State<Arc<CoachingService>>,
    AppQuery(query): AppQuery<CoachingQueryDto>,
) -> Result<Json<ApiResponse<CoachingResponseDto>>> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let message = service.coach(&query.message).await?;

    Ok(Json(ApiResponse::success(
        Some(CoachingResponseDto { message }),
        None,
    )))
}
