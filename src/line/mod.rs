// ABOUTME: LINE Messaging API platform: webhook model, signature check, Flex rendering, reply client
// ABOUTME: LineClient implements ReplyChannel by posting to the reply endpoint with the channel token

pub mod event;
pub mod flex;
pub mod rich_menu;
pub mod signature;

pub use event::{WebhookBody, WebhookEvent};

use anyhow::{Context, Result};
use async_trait::async_trait;
use concierge_core::config::LineConfig;
use concierge_core::{OutboundMessage, ReplyChannel};
use serde_json::json;
use std::time::Duration;

/// Maximum characters of an error body kept in logs and errors
const MAX_ERROR_BODY: usize = 500;

/// HTTP client for the LINE Messaging API
#[derive(Clone)]
pub struct LineClient {
    api_base_url: String,
    data_api_base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for LineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineClient")
            .field("api_base_url", &self.api_base_url)
            .field("data_api_base_url", &self.data_api_base_url)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl LineClient {
    pub fn new(config: &LineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build LINE HTTP client")?;
        Ok(Self {
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            data_api_base_url: config.data_api_base_url.trim_end_matches('/').to_string(),
            access_token: config.channel_access_token.clone(),
            client,
        })
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    pub(crate) fn data_api_url(&self, path: &str) -> String {
        format!("{}{}", self.data_api_base_url, path)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn token(&self) -> &str {
        &self.access_token
    }

    /// Send pre-rendered message objects as the reply bound to `reply_token`
    pub async fn reply_rendered(
        &self,
        reply_token: &str,
        messages: Vec<serde_json::Value>,
    ) -> Result<()> {
        let url = self.api_url("/v2/bot/message/reply");
        let body = json!({
            "replyToken": reply_token,
            "messages": messages,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("Failed to send LINE reply")?;

        ensure_success(response, "reply").await?;
        Ok(())
    }
}

/// Turn a non-2xx LINE response into an error carrying status and body
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    operation: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    anyhow::bail!("LINE {} failed with status {}: {}", operation, status, body)
}

#[async_trait]
impl ReplyChannel for LineClient {
    async fn reply(&self, reply_token: &str, messages: &[OutboundMessage]) -> Result<()> {
        let rendered = flex::render_messages(messages);
        if rendered.is_empty() {
            anyhow::bail!("Refusing to send an empty reply");
        }
        tracing::debug!(messages = rendered.len(), "Sending LINE reply");
        self.reply_rendered(reply_token, rendered).await
    }

    fn platform_id(&self) -> &'static str {
        "line"
    }
}
