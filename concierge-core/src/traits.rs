// ABOUTME: Collaborator traits and message types shared by the reply pipeline
// ABOUTME: KnowledgeSource (table fetch), GenerationBackend (LLM call), ReplyChannel (outbound send)

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

use crate::generator::{GenerateContentRequest, GenerateContentResponse};

// =============================================================================
// Message Types
// =============================================================================

/// A text message received from the messaging platform.
///
/// The reply token is single-use. The dispatcher takes the message by value,
/// so a token can be handed to the reply channel at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub text: String,
    pub reply_token: String,
}

impl InboundMessage {
    pub fn new(text: impl Into<String>, reply_token: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reply_token: reply_token.into(),
        }
    }
}

/// One horizontally-browsable card of a carousel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub hero_image_url: String,
    pub title: String,
    pub date_line: String,
    pub action_label: String,
    pub action_uri: String,
}

/// A set of cards plus the text shown by clients that cannot render them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Carousel {
    pub alt_text: String,
    pub cards: Vec<Card>,
}

/// Content of a single outbound message. A reply is an ordered sequence of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    PlainText(String),
    Carousel(Carousel),
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::PlainText(text.into())
    }

    /// Text body if this is a plain text message
    pub fn as_text(&self) -> Option<&str> {
        match self {
            OutboundMessage::PlainText(text) => Some(text),
            OutboundMessage::Carousel(_) => None,
        }
    }

    pub fn as_carousel(&self) -> Option<&Carousel> {
        match self {
            OutboundMessage::Carousel(carousel) => Some(carousel),
            OutboundMessage::PlainText(_) => None,
        }
    }
}

// =============================================================================
// Knowledge Store
// =============================================================================

/// Raw cell values of the two worksheets, exactly as the store returns them.
///
/// The events table carries its header row first. The QA table has no fixed
/// schema and is kept whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeTables {
    pub events: Vec<Vec<String>>,
    pub qa: Vec<Vec<String>>,
}

/// Read access to the spreadsheet-like knowledge store
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Fetch both tables in one logical read
    async fn fetch_tables(&self) -> Result<KnowledgeTables>;
}

// =============================================================================
// Generation Backend
// =============================================================================

/// Failure classes of a generation call.
///
/// Transport-level failures and unreadable bodies are kept apart because the
/// generator answers them with different canned replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Connection, DNS, TLS or I/O failure before a response arrived
    Transport(String),
    /// The request did not complete within its deadline
    Timeout,
    /// A response arrived but could not be decoded
    Malformed { status: u16, body: String },
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Transport(e) => write!(f, "transport error: {}", e),
            BackendError::Timeout => write!(f, "request timed out"),
            BackendError::Malformed { status, body } => {
                write!(f, "malformed response (status {}): {}", status, body)
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// A generative-AI endpoint that accepts a prepared request.
///
/// Backend-reported errors (`{"error": ...}`) come back as `Ok` with the
/// `error` field populated; only failures to obtain a decodable body are `Err`.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> std::result::Result<GenerateContentResponse, BackendError>;
}

// =============================================================================
// Reply Channel
// =============================================================================

/// Outbound side of the messaging platform
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    /// Send the messages as the single reply bound to `reply_token`
    async fn reply(&self, reply_token: &str, messages: &[OutboundMessage]) -> Result<()>;

    /// Platform identifier used in logs (e.g., "line")
    fn platform_id(&self) -> &'static str;
}
