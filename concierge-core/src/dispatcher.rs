// ABOUTME: Per-message orchestration: refresh knowledge, classify, build the reply, send it once
// ABOUTME: Single error boundary that turns every internal failure into a canned apology

use anyhow::Result;
use std::sync::Arc;

use crate::cache::DataSyncCache;
use crate::carousel::EventCarouselBuilder;
use crate::config::{Config, RepliesConfig};
use crate::generator::ResponseGenerator;
use crate::intent::{Intent, IntentRouter};
use crate::metrics;
use crate::traits::{
    GenerationBackend, InboundMessage, KnowledgeSource, OutboundMessage, ReplyChannel,
};

/// Outcome of handling one message, for callers that want to observe it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleResult {
    /// The reply was accepted by the reply channel
    Sent { intent: Intent, messages: usize },
    /// The reply was built but the channel rejected it (not retried)
    SendFailed { intent: Intent },
}

pub struct MessageDispatcher {
    cache: Arc<DataSyncCache>,
    router: IntentRouter,
    carousel: EventCarouselBuilder,
    generator: ResponseGenerator,
    reply_channel: Arc<dyn ReplyChannel>,
    replies: RepliesConfig,
    events_enabled: bool,
}

impl MessageDispatcher {
    pub fn new(
        cache: Arc<DataSyncCache>,
        router: IntentRouter,
        carousel: EventCarouselBuilder,
        generator: ResponseGenerator,
        reply_channel: Arc<dyn ReplyChannel>,
        replies: RepliesConfig,
        events_enabled: bool,
    ) -> Self {
        Self {
            cache,
            router,
            carousel,
            generator,
            reply_channel,
            replies,
            events_enabled,
        }
    }

    /// Wire every component from configuration and the three collaborators
    pub fn from_config(
        config: &Config,
        source: Arc<dyn KnowledgeSource>,
        backend: Arc<dyn GenerationBackend>,
        reply_channel: Arc<dyn ReplyChannel>,
    ) -> Self {
        let cache = Arc::new(DataSyncCache::new(source, &config.cache, &config.sheets));
        Self::new(
            cache,
            IntentRouter::from_config(&config.intent),
            EventCarouselBuilder::new(config.events.clone()),
            ResponseGenerator::new(
                backend,
                &config.persona,
                &config.replies,
                config.gemini.timeout_secs,
            ),
            reply_channel,
            config.replies.clone(),
            config.events.enabled,
        )
    }

    pub fn cache(&self) -> &Arc<DataSyncCache> {
        &self.cache
    }

    /// Handle one inbound message end to end. Consumes the message so its
    /// reply token is used at most once.
    pub async fn handle(&self, inbound: InboundMessage) -> HandleResult {
        let InboundMessage { text, reply_token } = inbound;
        let text = text.trim();
        let preview: String = text.chars().take(50).collect();
        tracing::info!(text_preview = %preview, "Message received");

        self.cache.ensure_fresh().await;

        let intent = self.router.classify(text);
        metrics::record_message(intent.as_str());
        tracing::debug!(intent = intent.as_str(), "Message classified");

        let messages = match self.build_reply(intent, text).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!(
                    operation = "build_reply",
                    intent = intent.as_str(),
                    error = %format!("{:#}", e),
                    "Failed to build reply, sending apology"
                );
                vec![OutboundMessage::text(self.replies.apology_no_answer.clone())]
            }
        };

        match self.reply_channel.reply(&reply_token, &messages).await {
            Ok(()) => {
                metrics::record_reply("sent");
                tracing::info!(
                    platform = self.reply_channel.platform_id(),
                    intent = intent.as_str(),
                    messages = messages.len(),
                    "Reply sent"
                );
                HandleResult::Sent {
                    intent,
                    messages: messages.len(),
                }
            }
            Err(e) => {
                metrics::record_reply("failed");
                tracing::error!(
                    operation = "reply",
                    platform = self.reply_channel.platform_id(),
                    intent = intent.as_str(),
                    error = %format!("{:#}", e),
                    "Failed to send reply, not retrying"
                );
                HandleResult::SendFailed { intent }
            }
        }
    }

    /// Build the reply for an already-classified message
    pub async fn build_reply(&self, intent: Intent, text: &str) -> Result<Vec<OutboundMessage>> {
        match intent {
            Intent::Activate => Ok(vec![OutboundMessage::text(self.replies.greeting.clone())]),
            Intent::ListEvents => {
                if !self.events_enabled {
                    return Ok(vec![OutboundMessage::text(
                        self.replies.events_unavailable.clone(),
                    )]);
                }
                let snapshot = self.cache.snapshot().await;
                if snapshot.events.is_empty() {
                    return Ok(vec![OutboundMessage::text(self.replies.no_events.clone())]);
                }
                let carousel = self.carousel.build(&snapshot.events)?;
                Ok(vec![OutboundMessage::Carousel(carousel)])
            }
            Intent::FreeForm => {
                let snapshot = self.cache.snapshot().await;
                let answer = self
                    .generator
                    .generate(text, &snapshot.knowledge_text)
                    .await;
                Ok(vec![OutboundMessage::text(answer)])
            }
        }
    }
}
