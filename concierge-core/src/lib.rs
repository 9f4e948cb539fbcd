// ABOUTME: Platform-agnostic core of the concierge bot
// ABOUTME: Knowledge cache, intent routing, carousel building, answer generation and dispatch

pub mod cache;
pub mod carousel;
pub mod config;
pub mod dispatcher;
pub mod generator;
pub mod intent;
pub mod knowledge;
pub mod metrics;
pub mod traits;

pub use cache::{CacheStatus, DataSyncCache, KnowledgeSnapshot, SyncSummary};
pub use carousel::{to_direct_link, EventCarouselBuilder};
pub use dispatcher::{HandleResult, MessageDispatcher};
pub use generator::ResponseGenerator;
pub use intent::{Intent, IntentRouter};
pub use knowledge::EventRecord;

// Re-export collaborator traits and message types
pub use traits::{
    BackendError, Card, Carousel, GenerationBackend, InboundMessage, KnowledgeSource,
    KnowledgeTables, OutboundMessage, ReplyChannel,
};
