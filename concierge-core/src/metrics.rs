// ABOUTME: Prometheus metrics for message handling, knowledge sync, generation and replies
// ABOUTME: Thin wrappers over the metrics facade so call sites stay one line

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return the render handle
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    metrics::describe_counter!(
        "concierge_messages_total",
        "Inbound text messages by classified intent"
    );
    metrics::describe_counter!(
        "concierge_sync_total",
        "Knowledge store sync attempts by outcome"
    );
    metrics::describe_counter!(
        "concierge_generation_total",
        "Generation backend calls by outcome"
    );
    metrics::describe_counter!("concierge_replies_total", "Reply sends by outcome");
    metrics::describe_counter!(
        "concierge_webhook_requests_total",
        "Webhook requests by result"
    );

    Ok(handle)
}

pub fn record_message(intent: &'static str) {
    metrics::counter!("concierge_messages_total", "intent" => intent).increment(1);
}

pub fn record_sync(outcome: &'static str) {
    metrics::counter!("concierge_sync_total", "outcome" => outcome).increment(1);
}

pub fn record_generation(outcome: &'static str) {
    metrics::counter!("concierge_generation_total", "outcome" => outcome).increment(1);
}

pub fn record_reply(outcome: &'static str) {
    metrics::counter!("concierge_replies_total", "outcome" => outcome).increment(1);
}

pub fn record_webhook_request(status: &'static str) {
    metrics::counter!("concierge_webhook_requests_total", "status" => status).increment(1);
}
