// ABOUTME: Answers free-form questions through the generation backend with a fixed persona
// ABOUTME: Wire types for generateContent plus graceful degradation to canned apologies

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{PersonaConfig, RepliesConfig};
use crate::metrics;
use crate::traits::{BackendError, GenerationBackend};

/// Bounds for the per-call deadline, in seconds
pub const MIN_TIMEOUT_SECS: u64 = 10;
pub const MAX_TIMEOUT_SECS: u64 = 20;

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicRetrievalConfig {
    pub mode: String,
    pub dynamic_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleSearchRetrieval {
    pub dynamic_retrieval_config: DynamicRetrievalConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleSearch {}

/// Grounding tool descriptor, serialized as `{"google_search": {}}` or
/// `{"google_search_retrieval": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    GoogleSearch(GoogleSearch),
    GoogleSearchRetrieval(GoogleSearchRetrieval),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(
        default,
        rename = "finishReason",
        skip_serializing_if = "Option::is_none"
    )]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<Candidate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl GenerateContentResponse {
    /// Response carrying a single candidate with one text part
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: Some(vec![Candidate {
                content: Some(Content::text(text)),
                finish_reason: None,
            }]),
            error: None,
        }
    }

    /// First candidate's first part text, if non-blank
    pub fn first_text(&self) -> Option<&str> {
        let text = self
            .candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()?;
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

// =============================================================================
// Generator
// =============================================================================

/// Compose the persona instruction. An explicit override wins; otherwise the
/// built-in rules are used, with the external-lookup rule only when grounding
/// is enabled.
pub fn system_instruction(persona: &PersonaConfig) -> String {
    if let Some(instruction) = &persona.instruction {
        return instruction.clone();
    }

    let heading = &persona.knowledge_heading;
    let lookup_rule = if persona.grounding.enabled {
        format!(
            "『{}』にない情報、バスの運行状況、天気、最新の営業状況などはGoogle検索を使用して回答を補完してください。",
            heading
        )
    } else {
        format!(
            "『{}』にない情報は推測で答えず、分からない旨を丁寧に伝えてください。",
            heading
        )
    };

    format!(
        "{role}\n【基本ルール】\n1. 丁寧で誠実な標準語で回答してください。\n2. まずは提供された『{heading}』を参考にしてください。\n3. {lookup_rule}\n4. 回答は{length}文字程度で簡潔にまとめ、最後に『{closing}』と添えてください。",
        role = persona.role,
        heading = heading,
        lookup_rule = lookup_rule,
        length = persona.answer_length,
        closing = persona.closing_phrase,
    )
}

fn grounding_tool(persona: &PersonaConfig) -> Option<Tool> {
    if !persona.grounding.enabled {
        return None;
    }
    Some(match persona.grounding.dynamic_threshold {
        Some(threshold) => Tool::GoogleSearchRetrieval(GoogleSearchRetrieval {
            dynamic_retrieval_config: DynamicRetrievalConfig {
                mode: "MODE_DYNAMIC".to_string(),
                dynamic_threshold: threshold,
            },
        }),
        None => Tool::GoogleSearch(GoogleSearch {}),
    })
}

/// Why a generation attempt produced no usable answer
#[derive(Debug, Clone, PartialEq, Eq)]
enum GenerationFailure {
    /// Backend unreachable or too slow
    Unreachable,
    /// Backend answered without usable text
    NoAnswer,
}

pub struct ResponseGenerator {
    backend: Arc<dyn GenerationBackend>,
    system_instruction: String,
    knowledge_heading: String,
    tool: Option<Tool>,
    timeout: Duration,
    apology_transport: String,
    apology_no_answer: String,
}

impl ResponseGenerator {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        persona: &PersonaConfig,
        replies: &RepliesConfig,
        timeout_secs: u64,
    ) -> Self {
        let clamped = timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
        if clamped != timeout_secs {
            tracing::warn!(
                requested = timeout_secs,
                applied = clamped,
                "Generation timeout out of range, clamping"
            );
        }
        Self {
            backend,
            system_instruction: system_instruction(persona),
            knowledge_heading: persona.knowledge_heading.clone(),
            tool: grounding_tool(persona),
            timeout: Duration::from_secs(clamped),
            apology_transport: replies.apology_transport.clone(),
            apology_no_answer: replies.apology_no_answer.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn build_request(&self, query: &str, knowledge_text: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Content::text(self.system_instruction.clone()),
            contents: vec![Content::text(format!(
                "{}:\n{}\n\n質問: {}",
                self.knowledge_heading, knowledge_text, query
            ))],
            tools: self.tool.clone().into_iter().collect(),
        }
    }

    /// Answer `query` using `knowledge_text`. Always returns user-presentable
    /// text: the backend's answer verbatim or one of the canned apologies.
    pub async fn generate(&self, query: &str, knowledge_text: &str) -> String {
        let request = self.build_request(query, knowledge_text);
        match self.attempt(&request).await {
            Ok(text) => {
                metrics::record_generation("success");
                text
            }
            Err(GenerationFailure::Unreachable) => {
                metrics::record_generation("unreachable");
                self.apology_transport.clone()
            }
            Err(GenerationFailure::NoAnswer) => {
                metrics::record_generation("no_answer");
                self.apology_no_answer.clone()
            }
        }
    }

    async fn attempt(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<String, GenerationFailure> {
        let response =
            match tokio::time::timeout(self.timeout, self.backend.generate_content(request)).await
            {
                Err(_) => {
                    tracing::error!(
                        operation = "generate_content",
                        timeout_secs = self.timeout.as_secs(),
                        "Generation backend timed out"
                    );
                    return Err(GenerationFailure::Unreachable);
                }
                Ok(Err(e @ (BackendError::Transport(_) | BackendError::Timeout))) => {
                    tracing::error!(
                        operation = "generate_content",
                        error = %e,
                        "Generation backend unreachable"
                    );
                    return Err(GenerationFailure::Unreachable);
                }
                Ok(Err(e @ BackendError::Malformed { .. })) => {
                    tracing::error!(
                        operation = "generate_content",
                        error = %e,
                        "Generation backend returned an unreadable response"
                    );
                    return Err(GenerationFailure::NoAnswer);
                }
                Ok(Ok(response)) => response,
            };

        if let Some(error) = &response.error {
            tracing::error!(
                operation = "generate_content",
                error = %error,
                "Generation backend reported an error"
            );
            return Err(GenerationFailure::NoAnswer);
        }

        match response.first_text() {
            Some(text) => Ok(text.to_string()),
            None => {
                tracing::warn!(
                    operation = "generate_content",
                    candidates = response.candidates.as_ref().map(|c| c.len()).unwrap_or(0),
                    finish_reason = ?response
                        .candidates
                        .as_ref()
                        .and_then(|c| c.first())
                        .and_then(|c| c.finish_reason.clone()),
                    "Generation backend returned no answer text"
                );
                Err(GenerationFailure::NoAnswer)
            }
        }
    }
}
