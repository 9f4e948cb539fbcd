// ABOUTME: HTTP server receiving LINE webhook callbacks plus health and metrics endpoints
// ABOUTME: Verifies signatures, acknowledges fast, and handles each text message in its own task

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use concierge_core::{metrics, HandleResult, MessageDispatcher};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::line::{signature, WebhookBody};

#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: Arc<MessageDispatcher>,
    pub channel_secret: String,
}

/// Build the application router. `/metrics` is mounted only when a
/// Prometheus handle is supplied.
pub fn router(state: WebhookState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let mut app = Router::new()
        .route("/callback", post(callback_handler))
        .route("/health", get(health_handler))
        .with_state(Arc::new(state));

    if let Some(handle) = metrics_handle {
        let metrics_routes = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(Arc::new(handle));
        app = app.merge(metrics_routes);
    }

    app.layer(TraceLayer::new_for_http())
}

/// Start the webhook HTTP server
pub async fn start_webhook_server(
    addr: &str,
    state: WebhookState,
    metrics_handle: Option<PrometheusHandle>,
) -> Result<()> {
    let app = router(state, metrics_handle);

    tracing::info!(addr = %addr, "Starting webhook server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Hand every text message event of a verified body to the dispatcher,
/// one task per message. Other event types are skipped.
pub fn spawn_message_tasks(
    dispatcher: &Arc<MessageDispatcher>,
    body: WebhookBody,
) -> Vec<JoinHandle<HandleResult>> {
    let mut handles = Vec::new();
    for event in body.events {
        let Some(inbound) = event.text_message() else {
            tracing::debug!(event_type = %event.event_type, "Skipping non-text event");
            continue;
        };
        if event.is_redelivery() {
            tracing::info!(
                webhook_event_id = ?event.webhook_event_id,
                "Handling redelivered message event"
            );
        }
        let dispatcher = Arc::clone(dispatcher);
        handles.push(tokio::spawn(async move { dispatcher.handle(inbound).await }));
    }
    handles
}

/// Handle LINE webhook POSTs
async fn callback_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let provided = headers
        .get(signature::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let verified = provided
        .map(|sig| signature::verify(&state.channel_secret, &body, sig))
        .unwrap_or(false);
    if !verified {
        tracing::warn!(
            signature_present = provided.is_some(),
            "Webhook signature verification failed"
        );
        metrics::record_webhook_request("bad_signature");
        return (StatusCode::BAD_REQUEST, "Invalid signature");
    }

    let payload: WebhookBody = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Webhook body is not a valid LINE payload");
            metrics::record_webhook_request("bad_request");
            return (StatusCode::BAD_REQUEST, "Invalid body");
        }
    };

    tracing::debug!(
        destination = %payload.destination,
        events = payload.events.len(),
        "Webhook received"
    );

    let spawned = spawn_message_tasks(&state.dispatcher, payload);
    metrics::record_webhook_request("ok");
    tracing::debug!(tasks = spawned.len(), "Message tasks spawned");

    (StatusCode::OK, "OK")
}

async fn health_handler(State(state): State<Arc<WebhookState>>) -> impl IntoResponse {
    let cache = state.dispatcher.cache().status().await;
    Json(json!({
        "status": "ok",
        "cache": cache,
    }))
}

async fn metrics_handler(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
