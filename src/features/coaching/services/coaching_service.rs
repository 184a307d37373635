use std::sync::Arc;

use crate::core::error::{AppError, Result};
use crate::features::coaching::clients::{CompletionClient, WebhookNotifier};
use crate::features::rate_limits::RateLimiter;
use crate::shared::prompts::render_coaching_prompt;

const UPSTREAM_FAILURE_MESSAGE: &str =
    "Upstream model request failed. Set INSECURE_DEBUG to true to view error details.";

/// Rate-limited coaching completions
pub struct CoachingService {
    rate_limiter: Arc<RateLimiter>,
    completion_client: Arc<dyn CompletionClient>,
    webhook: Arc<WebhookNotifier>,
    insecure_debug: bool,
}

impl CoachingService {
    pub fn new(
        rate_limiter: Arc<RateLimiter>,
        completion_client: Arc<dyn CompletionClient>,
        webhook: Arc<WebhookNotifier>,
        insecure_debug: bool,
    ) -> Self {
        Self {
            rate_limiter,
            completion_client,
            webhook,
            insecure_debug,
        }
    }

    /// Admit the request, ask the upstream model for coaching on `situation`
    /// and record the usage once the completion succeeds.
    pub async fn coach(&self, situation: &str) -> Result<String> {
        let admission = self.rate_limiter.admit().await?;

        let prompt = render_coaching_prompt(situation)
            .map_err(|e| AppError::Internal(format!("Failed to render prompt: {}", e)))?;

        let completion = self
            .completion_client
            .complete(&prompt)
            .await
            .map_err(|e| {
                tracing::error!("Completion request failed: {}", e);
                if self.insecure_debug {
                    AppError::ExternalServiceError(e.to_string())
                } else {
                    AppError::ExternalServiceError(UPSTREAM_FAILURE_MESSAGE.to_string())
                }
            })?;

        self.rate_limiter.settle(admission).await?;

        if self.webhook.is_enabled() {
            let webhook = Arc::clone(&self.webhook);
            let message = situation.to_string();
            let content = completion.clone();
            tokio::spawn(async move {
                webhook.notify_completion(&message, &content).await;
            });
        }

        Ok(completion)
    }
}
