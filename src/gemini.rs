// ABOUTME: Gemini generateContent client used as the generation backend
// ABOUTME: Classifies failures into transport, timeout and malformed-body errors for the generator

use anyhow::{Context, Result};
use async_trait::async_trait;
use concierge_core::config::GeminiConfig;
use concierge_core::generator::{GenerateContentRequest, GenerateContentResponse};
use concierge_core::{BackendError, GenerationBackend};
use std::time::Duration;

const MAX_ERROR_BODY: usize = 500;

#[derive(Clone)]
pub struct GeminiClient {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("Failed to build Gemini HTTP client")?;
        Ok(Self {
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.api_base_url.trim_end_matches('/'),
                config.model
            ),
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Transport(error.to_string())
    }
}

/// Decode a generateContent body. Error statuses still carry a JSON
/// `{"error": ...}` body, which decodes into the `error` field.
pub fn decode_response(status: u16, body: &str) -> Result<GenerateContentResponse, BackendError> {
    serde_json::from_str::<GenerateContentResponse>(body).map_err(|_| BackendError::Malformed {
        status,
        body: body.chars().take(MAX_ERROR_BODY).collect(),
    })
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, BackendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        if !status.is_success() {
            tracing::warn!(status = %status, "Gemini returned an error status");
        }

        decode_response(status.as_u16(), &body)
    }
}
