// ABOUTME: Shared mock collaborators for concierge-core integration tests
// ABOUTME: Scripted knowledge source, generation backend, and recording reply channel

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use concierge_core::generator::{GenerateContentRequest, GenerateContentResponse};
use concierge_core::{
    BackendError, GenerationBackend, KnowledgeSource, KnowledgeTables, OutboundMessage,
    ReplyChannel,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

pub fn events_header() -> Vec<String> {
    row(&["タイトル", "開催日", "画像URL", "詳細URL"])
}

/// Events table with a header and `count` titled rows named e0, e1, ...
pub fn event_table(count: usize) -> Vec<Vec<String>> {
    let mut rows = vec![events_header()];
    for i in 0..count {
        rows.push(row(&[
            &format!("e{}", i),
            "2026-11-01",
            "",
            &format!("https://example.com/e{}", i),
        ]));
    }
    rows
}

pub fn tables(event_count: usize, qa: &[&[&str]]) -> KnowledgeTables {
    KnowledgeTables {
        events: event_table(event_count),
        qa: qa.iter().map(|r| row(r)).collect(),
    }
}

// =============================================================================
// Knowledge source
// =============================================================================

/// Knowledge source that replays scripted outcomes and counts fetches.
/// Once the script is exhausted the last outcome repeats.
pub struct MockSource {
    script: Mutex<VecDeque<std::result::Result<KnowledgeTables, String>>>,
    last: Mutex<std::result::Result<KnowledgeTables, String>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn new(outcomes: Vec<std::result::Result<KnowledgeTables, String>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            last: Mutex::new(Err("no scripted outcome".to_string())),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn ok(tables: KnowledgeTables) -> Self {
        Self::new(vec![Ok(tables)])
    }

    pub fn failing(message: &str) -> Self {
        Self::new(vec![Err(message.to_string())])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeSource for MockSource {
    async fn fetch_tables(&self) -> Result<KnowledgeTables> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outcome = {
            let mut script = self.script.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = script.pop_front() {
                *last = next;
            }
            last.clone()
        };
        outcome.map_err(|e| anyhow::anyhow!(e))
    }
}

// =============================================================================
// Generation backend
// =============================================================================

#[derive(Clone)]
pub enum BackendBehavior {
    Respond(GenerateContentResponse),
    Fail(BackendError),
    Hang,
}

pub struct MockBackend {
    behavior: BackendBehavior,
    requests: Mutex<Vec<GenerateContentRequest>>,
}

impl MockBackend {
    pub fn new(behavior: BackendBehavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::new(BackendBehavior::Respond(GenerateContentResponse::from_text(
            text,
        )))
    }

    pub fn requests(&self) -> Vec<GenerateContentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> std::result::Result<GenerateContentResponse, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.behavior {
            BackendBehavior::Respond(response) => Ok(response.clone()),
            BackendBehavior::Fail(error) => Err(error.clone()),
            BackendBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(BackendError::Timeout)
            }
        }
    }
}

// =============================================================================
// Reply channel
// =============================================================================

#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(String, Vec<OutboundMessage>)>>,
    fail: bool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, Vec<OutboundMessage>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplyChannel for RecordingChannel {
    async fn reply(&self, reply_token: &str, messages: &[OutboundMessage]) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((reply_token.to_string(), messages.to_vec()));
        if self.fail {
            anyhow::bail!("Invalid reply token");
        }
        Ok(())
    }

    fn platform_id(&self) -> &'static str {
        "mock"
    }
}

pub fn as_source(source: &Arc<MockSource>) -> Arc<dyn KnowledgeSource> {
    Arc::clone(source) as Arc<dyn KnowledgeSource>
}
