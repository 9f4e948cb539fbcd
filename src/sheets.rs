// ABOUTME: Google Sheets v4 client serving as the bot's knowledge store
// ABOUTME: Reads the events and QA worksheets in one values:batchGet call

use anyhow::{Context, Result};
use async_trait::async_trait;
use concierge_core::config::SheetsConfig;
use concierge_core::{KnowledgeSource, KnowledgeTables};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    range: String,
    /// Absent when the worksheet has no data
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Credential used for Sheets requests
#[derive(Clone)]
enum SheetsAuth {
    ApiKey(String),
    Bearer(String),
}

#[derive(Clone)]
pub struct SheetsClient {
    base_url: String,
    spreadsheet_id: String,
    events_sheet: String,
    qa_sheet: String,
    auth: SheetsAuth,
    client: reqwest::Client,
}

impl std::fmt::Debug for SheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsClient")
            .field("base_url", &self.base_url)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("events_sheet", &self.events_sheet)
            .field("qa_sheet", &self.qa_sheet)
            .finish_non_exhaustive()
    }
}

impl SheetsClient {
    /// Build a client from config. A bearer token wins over an API key.
    pub fn new(config: &SheetsConfig) -> Result<Self> {
        let auth = match (&config.access_token, &config.api_key) {
            (Some(token), _) if !token.trim().is_empty() => SheetsAuth::Bearer(token.clone()),
            (_, Some(key)) if !key.trim().is_empty() => SheetsAuth::ApiKey(key.clone()),
            _ => anyhow::bail!("Either sheets.api_key or sheets.access_token is required"),
        };

        // The cache applies its own deadline; this one only bounds a stuck connection
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("Failed to build Sheets HTTP client")?;

        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            events_sheet: config.events_sheet.clone(),
            qa_sheet: config.qa_sheet.clone(),
            auth,
            client,
        })
    }

    fn batch_get_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values:batchGet",
            self.base_url, self.spreadsheet_id
        )
    }

    /// Fetch whole worksheets by name, in the order given
    pub async fn fetch_sheets(&self, sheet_names: &[&str]) -> Result<Vec<Vec<Vec<String>>>> {
        let mut query: Vec<(&str, String)> = sheet_names
            .iter()
            .map(|name| ("ranges", quote_sheet_name(name)))
            .collect();
        query.push(("majorDimension", "ROWS".to_string()));

        let mut request = self.client.get(self.batch_get_url());
        match &self.auth {
            SheetsAuth::ApiKey(key) => query.push(("key", key.clone())),
            SheetsAuth::Bearer(token) => request = request.bearer_auth(token),
        }

        let response = request
            .query(&query)
            .send()
            .await
            .context("Failed to reach Google Sheets")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            anyhow::bail!("Google Sheets returned {}: {}", status, body);
        }

        let batch: BatchGetResponse = response
            .json()
            .await
            .context("Failed to decode Google Sheets response")?;

        if batch.value_ranges.len() != sheet_names.len() {
            anyhow::bail!(
                "Google Sheets returned {} ranges for {} worksheets",
                batch.value_ranges.len(),
                sheet_names.len()
            );
        }

        Ok(batch
            .value_ranges
            .into_iter()
            .map(|range| {
                tracing::debug!(range = %range.range, rows = range.values.len(), "Fetched range");
                cells_to_strings(range.values)
            })
            .collect())
    }
}

#[async_trait]
impl KnowledgeSource for SheetsClient {
    async fn fetch_tables(&self) -> Result<KnowledgeTables> {
        let mut sheets = self
            .fetch_sheets(&[self.events_sheet.as_str(), self.qa_sheet.as_str()])
            .await?
            .into_iter();
        let events = sheets.next().unwrap_or_default();
        let qa = sheets.next().unwrap_or_default();
        Ok(KnowledgeTables { events, qa })
    }
}

/// A1 notation for a whole worksheet; embedded quotes are doubled
fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

/// Render cell values as the text a reader sees in the sheet
fn cells_to_strings(rows: Vec<Vec<Value>>) -> Vec<Vec<String>> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}
