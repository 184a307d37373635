use serde::Serialize;

use crate::core::config::WebhookConfig;

const WEBHOOK_USERNAME: &str = "Debug notification of successful coaching";

/// Discord webhook body
#[derive(Debug, Serialize)]
pub struct DiscordWebhookPayload {
    pub content: String,
    pub username: &'static str,
}

impl DiscordWebhookPayload {
    pub fn for_completion(message: &str, completion: &str) -> Self {
        Self {
            content: format!("{}\n\n{}", message, completion),
            username: WEBHOOK_USERNAME,
        }
    }
}

/// Posts successful completions to an optional Discord webhook. Delivery is
/// best effort and never affects the caller's response.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.discord_url.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    pub async fn notify_completion(&self, message: &str, completion: &str) {
        let Some(url) = self.url.as_deref() else {
            return;
        };

        let payload = DiscordWebhookPayload::for_completion(message, completion);
        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Webhook notification delivered");
            }
            Ok(response) => {
                tracing::warn!("Webhook returned status: {}", response.status());
            }
            Err(e) => {
                tracing::warn!("Webhook notification failed: {}", e);
            }
        }
    }
}
