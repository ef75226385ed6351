use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::inference::retry::RetryPolicy;

/// One inbound webhook event from the Telegram Bot API. `update_id` is the
/// channel's event identifier and keys the idempotency guard.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

/// Outbound side of the message channel. The pipeline only ever talks to
/// this seam, so tests can swap in a recording double.
#[async_trait]
pub trait OutboundChannel: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;
}

/// Client for the Telegram Bot API.
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl TelegramClient {
    pub fn new(token: &str, retry: RetryPolicy) -> Self {
        Self::with_base_url(format!("https://api.telegram.org/bot{token}"), retry)
    }

    /// Base URL override, mainly for pointing at a local test server.
    pub fn with_base_url(base_url: String, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            retry,
        }
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> anyhow::Result<()> {
        let url = format!("{}/{method}", self.base_url);
        self.retry
            .run(method, || async {
                let response = self.client.post(&url).json(&body).send().await?;
                if !response.status().is_success() {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    anyhow::bail!("telegram {method} failed: {status}: {text}");
                }
                Ok(())
            })
            .await
    }

    /// Register the public webhook URL with Telegram. The secret token is
    /// echoed back by Telegram on every delivery and verified at the
    /// gateway.
    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> anyhow::Result<()> {
        let mut body = serde_json::json!({ "url": url });
        if let Some(secret) = secret {
            body["secret_token"] = serde_json::json!(secret);
        }
        self.call("setWebhook", body).await
    }
}

#[async_trait]
impl OutboundChannel for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        debug!(chat_id, chars = text.len(), "sending reply");
        self.call(
            "sendMessage",
            serde_json::json!({ "chat_id": chat_id, "text": text }),
        )
        .await
    }
}
