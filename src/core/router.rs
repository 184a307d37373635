use std::sync::Arc;

use axum::{http::StatusCode, routing::get, Router};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::core::config::Config;
use crate::core::middleware;
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::features::coaching::{routes as coaching_routes, CoachingService};
use crate::features::rate_limits::{routes as rate_limits_routes, RateLimiter};

/// Services shared by the HTTP handlers
pub struct AppServices {
    pub coaching: Arc<CoachingService>,
    pub rate_limiter: Arc<RateLimiter>,
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

pub fn build_router(config: &Config, services: AppServices) -> Router {
    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let swagger =
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi));

    // Protected routes (require the proxy API key)
    let protected_routes = Router::new()
        .merge(coaching_routes::routes(services.coaching))
        .merge(rate_limits_routes::routes(services.rate_limiter))
        .route_layer(axum::middleware::from_fn_with_state(
            Arc::new(config.auth.api_key.clone()),
            middleware::api_key_auth_middleware,
        ));

    let health_route = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(swagger)
        .merge(protected_routes)
        .merge(health_route)
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{RateLimitConfig, WebhookConfig};
    use crate::features::coaching::clients::openai_client::CompletionError;
    use crate::features::coaching::clients::{CompletionClient, WebhookNotifier};
    use crate::features::usage::UsageStore;
    use crate::shared::prompts::CoachingPrompt;
    use crate::shared::test_helpers::{create_test_limiter, create_test_store, limits};
    use async_trait::async_trait;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tempfile::TempDir;

    const API_KEY: &str = "proxy-secret";
    const COACHING_PATH: &str = "/api/openai/joycoachgpt";

    struct FakeCompletion {
        fail: bool,
    }

    #[async_trait]
    impl CompletionClient for FakeCompletion {
        async fn complete(&self, _prompt: &CoachingPrompt) -> Result<String, CompletionError> {
            if self.fail {
                Err(CompletionError::EmptyResponse)
            } else {
                Ok("Take a walk together.".to_string())
            }
        }
    }

    fn test_config() -> Config {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-test-key"),
            ("PROXYGPT_API_KEY", API_KEY),
        ]);
        Config::from_lookup(&|key| vars.get(key).map(|v| v.to_string())).unwrap()
    }

    struct Harness {
        server: TestServer,
        store: Arc<UsageStore>,
        _dir: TempDir,
    }

    async fn harness(rate_limit: RateLimitConfig, upstream_fails: bool) -> Harness {
        let (store, dir) = create_test_store().await;
        let rate_limiter = create_test_limiter(&store, rate_limit);
        let coaching = Arc::new(CoachingService::new(
            Arc::clone(&rate_limiter),
            Arc::new(FakeCompletion {
                fail: upstream_fails,
            }),
            Arc::new(WebhookNotifier::new(&WebhookConfig::default())),
            false,
        ));

        let app = build_router(
            &test_config(),
            AppServices {
                coaching,
                rate_limiter,
            },
        );

        Harness {
            server: TestServer::new(app).unwrap(),
            store,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_health_needs_no_key() {
        let h = harness(limits(None, None), false).await;

        let response = h.server.get("/health").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_missing_or_wrong_key_is_unauthorized() {
        let h = harness(limits(Some(5), None), false).await;

        let missing = h
            .server
            .post(COACHING_PATH)
            .add_query_param("message", "hello")
            .await;
        assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

        let wrong = h
            .server
            .get("/ratelimit")
            .authorization_bearer("not-the-key")
            .await;
        assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.json::<Value>()["message"], "Invalid API key");

        assert_eq!(h.store.count_since(0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_completion_is_returned_and_recorded() {
        let h = harness(limits(Some(5), Some(10)), false).await;

        let response = h
            .server
            .post(COACHING_PATH)
            .add_query_param("message", "my friend is sad")
            .authorization_bearer(API_KEY)
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<Value>();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["message"], "Take a walk together.");
        assert_eq!(h.store.count_since(0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_limit_returns_429() {
        let h = harness(limits(Some(1), None), false).await;

        let first = h
            .server
            .post(COACHING_PATH)
            .add_query_param("message", "one")
            .authorization_bearer(API_KEY)
            .await;
        assert_eq!(first.status_code(), StatusCode::OK);

        let second = h
            .server
            .post(COACHING_PATH)
            .add_query_param("message", "two")
            .authorization_bearer(API_KEY)
            .await;

        assert_eq!(second.status_code(), StatusCode::TOO_MANY_REQUESTS);
        let message = second.json::<Value>()["message"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(message.contains("/ratelimit"));
        assert_eq!(h.store.count_since(0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_or_empty_message_is_bad_request() {
        let h = harness(limits(Some(1), None), false).await;

        let missing = h
            .server
            .post(COACHING_PATH)
            .authorization_bearer(API_KEY)
            .await;
        assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);

        let empty = h
            .server
            .post(COACHING_PATH)
            .add_query_param("message", "")
            .authorization_bearer(API_KEY)
            .await;
        assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);

        assert_eq!(h.store.count_since(0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway_and_not_recorded() {
        let h = harness(limits(Some(5), None), true).await;

        let response = h
            .server
            .post(COACHING_PATH)
            .add_query_param("message", "hello")
            .authorization_bearer(API_KEY)
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.json::<Value>()["success"], false);
        assert_eq!(h.store.count_since(0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_reports_disabled_explicitly() {
        let h = harness(limits(None, None), false).await;

        let response = h
            .server
            .get("/ratelimit")
            .authorization_bearer(API_KEY)
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(
            response.json::<Value>()["data"],
            json!({ "enabled": false, "message": "Rate limit is not enabled." })
        );
    }

    #[tokio::test]
    async fn test_status_reports_usage_without_recording() {
        let h = harness(limits(Some(3), Some(7)), false).await;
        let now = chrono::Utc::now().timestamp();
        h.store.record(now).await.unwrap();
        h.store.record(now).await.unwrap();

        for _ in 0..2 {
            let response = h
                .server
                .get("/ratelimit")
                .authorization_bearer(API_KEY)
                .await;

            assert_eq!(response.status_code(), StatusCode::OK);
            assert_eq!(
                response.json::<Value>()["data"],
                json!({
                    "enabled": true,
                    "hourly_limit": 3,
                    "hourly_api_usage": 2,
                    "daily_limit": 7,
                    "daily_api_usage": 2
                })
            );
        }
    }

    #[tokio::test]
    async fn test_unreachable_usage_log_fails_closed() {
        let h = harness(limits(Some(5), None), false).await;
        h.store.pool().close().await;

        let response = h
            .server
            .post(COACHING_PATH)
            .add_query_param("message", "hello")
            .authorization_bearer(API_KEY)
            .await;

        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_openapi_document_lists_routes() {
        let h = harness(limits(None, None), false).await;

        let response = h.server.get("/api-docs/openapi.json").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let doc = response.json::<Value>();
        assert_eq!(doc["info"]["title"], "ProxyGPT API");
        assert!(doc["paths"]["/api/openai/joycoachgpt"]["post"].is_object());
        assert!(doc["paths"]["/ratelimit"]["get"].is_object());
    }
}
