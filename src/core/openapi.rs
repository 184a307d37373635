use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::coaching::{dtos as coaching_dtos, handlers as coaching_handlers};
use crate::features::rate_limits::{dtos as rate_limits_dtos, handlers as rate_limits_handlers};
use crate::shared::types::ApiResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        // Coaching
        coaching_handlers::create_coaching_completion,
        // Rate Limits
        rate_limits_handlers::get_rate_limit_status,
    ),
    components(
        schemas(
            // Coaching
            coaching_dtos::CoachingResponseDto,
            ApiResponse<coaching_dtos::CoachingResponseDto>,
            // Rate Limits
            rate_limits_dtos::RateLimitStatusDto,
            ApiResponse<rate_limits_dtos::RateLimitStatusDto>,
        )
    ),
    tags(
        (name = "coaching", description = "Templated chat completions"),
        (name = "rate-limits", description = "Hourly and daily usage limits"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "ProxyGPT API",
        version = "0.1.0",
        description = "API documentation for ProxyGPT",
    )
)]
pub struct ApiDoc;

/// Adds the proxy API key bearer scheme to the OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("API key")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
