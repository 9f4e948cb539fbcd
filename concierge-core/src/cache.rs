// ABOUTME: TTL-memoized knowledge snapshot shared by every message handler
// ABOUTME: Single-flight refresh from the knowledge store with stale-but-available fallback

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::config::{CacheConfig, EventColumns, SheetsConfig};
use crate::knowledge::{flatten_rows, parse_event_rows, select_recent_events, EventRecord};
use crate::metrics;
use crate::traits::KnowledgeSource;

/// Immutable view of the knowledge store at one point in time.
///
/// A snapshot is never mutated; refresh builds a new one and swaps it in.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeSnapshot {
    pub events: Vec<EventRecord>,
    pub knowledge_text: String,
    /// Completion time of the fetch that produced this snapshot
    pub last_updated: Option<Instant>,
    /// Wall-clock twin of `last_updated`, for operators
    pub synced_at: Option<DateTime<Utc>>,
}

impl KnowledgeSnapshot {
    /// A never-synchronized snapshot is always stale
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.last_updated
            .is_some_and(|updated| now.saturating_duration_since(updated) < ttl)
    }

    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.last_updated
            .map(|updated| now.saturating_duration_since(updated))
    }
}

/// Counts from one successful sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub events: usize,
    pub knowledge_chars: usize,
    pub elapsed: Duration,
}

/// Point-in-time cache state for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub fresh: bool,
    pub events: usize,
    pub knowledge_chars: usize,
    pub synced_at: Option<DateTime<Utc>>,
    pub age_secs: Option<u64>,
    pub last_error: Option<String>,
}

/// Bookkeeping guarded by the refresh gate
#[derive(Debug, Default)]
struct RefreshState {
    last_attempt: Option<Instant>,
}

/// Process-wide holder of the knowledge snapshot.
///
/// Readers clone the current `Arc<KnowledgeSnapshot>` under a short read lock.
/// At most one refresh runs at a time: callers that observe a stale snapshot
/// queue on the refresh gate, and once inside they skip fetching if an attempt
/// started after they began waiting, reusing that attempt's outcome (success
/// or failure) instead of issuing another fetch.
pub struct DataSyncCache {
    source: Arc<dyn KnowledgeSource>,
    columns: EventColumns,
    ttl: Duration,
    max_events: usize,
    fetch_timeout: Duration,
    snapshot: RwLock<Arc<KnowledgeSnapshot>>,
    refresh_gate: Mutex<RefreshState>,
    last_error: std::sync::Mutex<Option<String>>,
}

impl DataSyncCache {
    pub fn new(
        source: Arc<dyn KnowledgeSource>,
        cache: &CacheConfig,
        sheets: &SheetsConfig,
    ) -> Self {
        Self {
            source,
            columns: sheets.columns.clone(),
            ttl: cache.ttl(),
            max_events: cache.max_events,
            fetch_timeout: Duration::from_secs(sheets.timeout_secs),
            snapshot: RwLock::new(Arc::new(KnowledgeSnapshot::default())),
            refresh_gate: Mutex::new(RefreshState::default()),
            last_error: std::sync::Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current snapshot; cheap to clone and safe to hold across awaits
    pub async fn snapshot(&self) -> Arc<KnowledgeSnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    pub async fn is_fresh(&self) -> bool {
        self.snapshot().await.is_fresh(Instant::now(), self.ttl)
    }

    /// Refresh the snapshot if it is stale. Never fails: a failed fetch is
    /// logged and the previous snapshot stays in place.
    pub async fn ensure_fresh(&self) {
        let requested_at = Instant::now();
        if self.snapshot().await.is_fresh(requested_at, self.ttl) {
            return;
        }

        let mut gate = self.refresh_gate.lock().await;
        if gate.last_attempt.is_some_and(|attempt| attempt >= requested_at) {
            tracing::debug!("Knowledge refresh already attempted while waiting, reusing outcome");
            return;
        }
        if self.snapshot().await.is_fresh(Instant::now(), self.ttl) {
            return;
        }

        gate.last_attempt = Some(Instant::now());
        if let Err(e) = self.refresh().await {
            tracing::error!(
                operation = "knowledge_sync",
                error = %format!("{:#}", e),
                "Knowledge sync failed, keeping previous snapshot"
            );
        }
    }

    /// Fetch unconditionally (still single-flight) and report the outcome
    pub async fn refresh_now(&self) -> Result<SyncSummary> {
        let mut gate = self.refresh_gate.lock().await;
        gate.last_attempt = Some(Instant::now());
        self.refresh().await
    }

    /// One fetch attempt. Must be called with the refresh gate held.
    async fn refresh(&self) -> Result<SyncSummary> {
        let started = Instant::now();
        tracing::info!("Starting knowledge sync");

        let outcome = tokio::time::timeout(self.fetch_timeout, self.source.fetch_tables())
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "knowledge store did not answer within {}s",
                    self.fetch_timeout.as_secs()
                )
            })
            .and_then(|fetched| fetched.context("Failed to fetch knowledge tables"));

        let tables = match outcome {
            Ok(tables) => tables,
            Err(e) => {
                metrics::record_sync("error");
                self.set_last_error(Some(format!("{:#}", e)));
                return Err(e);
            }
        };

        let events = select_recent_events(
            parse_event_rows(&tables.events, &self.columns),
            self.max_events,
        );
        let knowledge_text = flatten_rows(&tables.qa);
        let completed = Instant::now();

        let next = Arc::new(KnowledgeSnapshot {
            events,
            knowledge_text,
            last_updated: Some(completed),
            synced_at: Some(Utc::now()),
        });
        let summary = SyncSummary {
            events: next.events.len(),
            knowledge_chars: next.knowledge_text.chars().count(),
            elapsed: completed.saturating_duration_since(started),
        };

        *self.snapshot.write().await = next;
        self.set_last_error(None);
        metrics::record_sync("success");

        tracing::info!(
            events = summary.events,
            knowledge_chars = summary.knowledge_chars,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Knowledge sync succeeded"
        );
        Ok(summary)
    }

    fn set_last_error(&self, error: Option<String>) {
        match self.last_error.lock() {
            Ok(mut slot) => *slot = error,
            Err(poisoned) => *poisoned.into_inner() = error,
        }
    }

    pub async fn status(&self) -> CacheStatus {
        let snapshot = self.snapshot().await;
        let now = Instant::now();
        let last_error = match self.last_error.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        CacheStatus {
            fresh: snapshot.is_fresh(now, self.ttl),
            events: snapshot.events.len(),
            knowledge_chars: snapshot.knowledge_text.chars().count(),
            synced_at: snapshot.synced_at,
            age_secs: snapshot.age(now).map(|age| age.as_secs()),
            last_error,
        }
    }
}
