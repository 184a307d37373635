pub mod discord_webhook;
pub mod openai_client;

pub use discord_webhook::WebhookNotifier;
pub use openai_client::{CompletionClient, OpenAIClient};
