// ABOUTME: Shared helpers for integration tests: a scriptable local HTTP stub and mock collaborators
// ABOUTME: The stub records every request so tests can assert on paths, headers, and bodies

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use concierge::config::Config;
use concierge_core::{OutboundMessage, ReplyChannel};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// HTTP stub server
// =============================================================================

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// Decoded query pairs in order
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        serde_urlencoded_pairs(&self.query)
    }
}

fn serde_urlencoded_pairs(query: &str) -> Vec<(String, String)> {
    let url = reqwest::Url::parse(&format!("http://stub/?{}", query)).unwrap();
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[derive(Clone)]
pub struct StubResponse {
    pub status: StatusCode,
    pub body: String,
    pub delay: Duration,
}

impl StubResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct StubInner {
    routes: Mutex<HashMap<(Method, String), StubResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Local HTTP server answering scripted responses by method and path.
/// Unscripted routes answer 404.
#[derive(Clone)]
pub struct StubServer {
    pub base_url: String,
    inner: Arc<StubInner>,
}

impl StubServer {
    pub async fn start() -> Self {
        let inner = Arc::new(StubInner::default());
        let app = Router::new()
            .fallback(stub_handler)
            .with_state(Arc::clone(&inner));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{}", addr),
            inner,
        }
    }

    pub fn on(&self, method: Method, path: &str, response: StubResponse) {
        self.inner
            .routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

async fn stub_handler(
    State(inner): State<Arc<StubInner>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    inner.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().unwrap_or_default().to_string(),
        headers,
        body,
    });

    let scripted = inner.routes.lock().unwrap().get(&(method, path)).cloned();
    match scripted {
        Some(response) => {
            if !response.delay.is_zero() {
                tokio::time::sleep(response.delay).await;
            }
            (
                response.status,
                [("content-type", "application/json")],
                response.body,
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "no stub").into_response(),
    }
}

/// Base URL nothing listens on
pub async fn unused_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

// =============================================================================
// Config and collaborators
// =============================================================================

/// Valid config with every remote pointed at `base_url`
pub fn config_for(base_url: &str) -> Config {
    let mut config = Config::default();
    config.line.channel_access_token = "line-token".to_string();
    config.line.channel_secret = "line-secret".to_string();
    config.line.api_base_url = base_url.to_string();
    config.line.data_api_base_url = base_url.to_string();
    config.sheets.spreadsheet_id = "sheet-123".to_string();
    config.sheets.api_key = Some("sheets-key".to_string());
    config.sheets.api_base_url = base_url.to_string();
    config.gemini.api_key = "gemini-key".to_string();
    config.gemini.api_base_url = base_url.to_string();
    config
}

pub const BATCH_GET_PATH: &str = "/v4/spreadsheets/sheet-123/values:batchGet";
pub const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";
pub const REPLY_PATH: &str = "/v2/bot/message/reply";

/// batchGet body with an events sheet of `event_count` rows and the given QA rows
pub fn batch_get_body(event_count: usize, qa: &[&[&str]]) -> serde_json::Value {
    let mut events = vec![serde_json::json!(["タイトル", "開催日", "画像URL", "詳細URL"])];
    for i in 0..event_count {
        events.push(serde_json::json!([
            format!("e{}", i),
            "2026-11-01",
            "https://drive.google.com/file/d/IMG/view",
            format!("https://example.com/e{}", i)
        ]));
    }
    serde_json::json!({
        "spreadsheetId": "sheet-123",
        "valueRanges": [
            {"range": "'イベント情報'!A1:D100", "majorDimension": "ROWS", "values": events},
            {"range": "'QA'!A1:B100", "majorDimension": "ROWS", "values": qa},
        ]
    })
}

pub fn gemini_answer(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

/// Reply channel that records sends in memory
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(String, Vec<OutboundMessage>)>>,
}

impl RecordingChannel {
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
        Ok(())
    }

    fn platform_id(&self) -> &'static str {
        "recording"
    }
}

/// Poll until `check` passes or a few seconds elapse
pub async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
