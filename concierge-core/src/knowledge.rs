// ABOUTME: Typed knowledge model built from raw worksheet cells
// ABOUTME: EventRecord mapping by header name, title filtering, and QA flattening

use crate::config::EventColumns;

/// One row of the events table.
///
/// Every field is optional; empty cells are stored as `None` so the
/// defaulting rules live in one place (the carousel builder).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecord {
    pub title: Option<String>,
    pub date: Option<String>,
    pub image_url: Option<String>,
    pub detail_url: Option<String>,
}

impl EventRecord {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn has_title(&self) -> bool {
        self.title.is_some()
    }
}

/// Resolved column positions of the recognized headers
#[derive(Debug, Clone, Copy, Default)]
struct ColumnIndex {
    title: Option<usize>,
    date: Option<usize>,
    image_url: Option<usize>,
    detail_url: Option<usize>,
}

impl ColumnIndex {
    fn resolve(header: &[String], columns: &EventColumns) -> Self {
        let find = |name: &str| header.iter().position(|h| h.trim() == name);
        Self {
            title: find(&columns.title),
            date: find(&columns.date),
            image_url: find(&columns.image_url),
            detail_url: find(&columns.detail_url),
        }
    }
}

fn cell(row: &[String], index: Option<usize>) -> Option<String> {
    let value = row.get(index?)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Map the events table (header row first) into typed records.
///
/// Unknown columns are ignored and short rows read as missing cells.
pub fn parse_event_rows(rows: &[Vec<String>], columns: &EventColumns) -> Vec<EventRecord> {
    let Some((header, body)) = rows.split_first() else {
        return Vec::new();
    };
    let index = ColumnIndex::resolve(header, columns);
    if index.title.is_none() {
        tracing::warn!(
            title_column = %columns.title,
            "Events table has no title column, every row will be discarded"
        );
    }

    body.iter()
        .map(|row| EventRecord {
            title: cell(row, index.title),
            date: cell(row, index.date),
            image_url: cell(row, index.image_url),
            detail_url: cell(row, index.detail_url),
        })
        .collect()
}

/// Drop untitled records and keep the last `limit` survivors in source order
pub fn select_recent_events(records: Vec<EventRecord>, limit: usize) -> Vec<EventRecord> {
    let mut titled: Vec<EventRecord> = records.into_iter().filter(EventRecord::has_title).collect();
    if titled.len() > limit {
        titled.drain(..titled.len() - limit);
    }
    titled
}

/// Flatten free-form rows: cells joined by commas, rows joined by newlines
pub fn flatten_rows(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| row.join(","))
        .collect::<Vec<_>>()
        .join("\n")
}
