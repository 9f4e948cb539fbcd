// ABOUTME: Pure transform from event records to a card carousel
// ABOUTME: Applies title/link defaults and normalizes share links into direct image URLs

use regex::Regex;
use std::sync::LazyLock;

use crate::config::EventsConfig;
use crate::knowledge::EventRecord;
use crate::traits::{Card, Carousel};

/// Carousel size accepted by the messaging platform
pub const MAX_CARDS: usize = 10;

static SHARE_PATH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/d/([^/?#&]+)").expect("valid share path regex"));
static QUERY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]id=([^&#]+)").expect("valid id query regex"));

fn is_web_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn direct_view_url(id: &str) -> String {
    format!("https://drive.google.com/uc?export=view&id={}", id)
}

/// Normalize an image link for direct embedding.
///
/// Non-http(s) input yields the placeholder; share links (`/d/<id>` or
/// `?id=<id>`) become direct-view URLs; any other URL passes through.
pub fn to_direct_link(raw_url: &str, placeholder: &str) -> String {
    let url = raw_url.trim();
    if !is_web_url(url) {
        return placeholder.to_string();
    }
    if let Some(id) = SHARE_PATH_ID.captures(url).and_then(|c| c.get(1)) {
        return direct_view_url(id.as_str());
    }
    if let Some(id) = QUERY_ID.captures(url).and_then(|c| c.get(1)) {
        return direct_view_url(id.as_str());
    }
    url.to_string()
}

#[derive(Debug, Clone)]
pub struct EventCarouselBuilder {
    config: EventsConfig,
}

impl EventCarouselBuilder {
    pub fn new(config: EventsConfig) -> Self {
        Self { config }
    }

    pub fn card(&self, event: &EventRecord) -> Card {
        let title = event
            .title
            .clone()
            .unwrap_or_else(|| self.config.default_title.clone());
        let detail_url = event
            .detail_url
            .as_deref()
            .map(str::trim)
            .filter(|url| is_web_url(url))
            .map_or_else(|| self.config.default_detail_url.clone(), str::to_string);
        Card {
            hero_image_url: to_direct_link(
                event.image_url.as_deref().unwrap_or_default(),
                &self.config.placeholder_image_url,
            ),
            title,
            date_line: format!(
                "{}{}",
                self.config.date_prefix,
                event.date.as_deref().unwrap_or_default()
            ),
            action_label: self.config.button_label.clone(),
            action_uri: detail_url,
        }
    }

    /// Build one card per record, keeping the most recent `MAX_CARDS`.
    /// Callers handle the empty case themselves.
    pub fn build(&self, events: &[EventRecord]) -> anyhow::Result<Carousel> {
        if events.is_empty() {
            anyhow::bail!("cannot build a carousel from zero events");
        }
        if self.config.alt_text.trim().is_empty() {
            anyhow::bail!("carousel alt text must not be empty");
        }
        let skip = events.len().saturating_sub(MAX_CARDS);
        if skip > 0 {
            tracing::warn!(
                events = events.len(),
                max = MAX_CARDS,
                "Too many events for one carousel, dropping the oldest records"
            );
        }
        Ok(Carousel {
            alt_text: self.config.alt_text.clone(),
            cards: events[skip..].iter().map(|e| self.card(e)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACEHOLDER: &str = "https://via.placeholder.com/1000x650.png?text=No+Image";

    fn builder() -> EventCarouselBuilder {
        EventCarouselBuilder::new(EventsConfig::default())
    }

    #[test]
    fn test_to_direct_link_share_path() {
        let link = to_direct_link("https://host/d/ABC123/view", PLACEHOLDER);
        assert_eq!(link, "https://drive.google.com/uc?export=view&id=ABC123");
    }

    #[test]
    fn test_to_direct_link_query_id() {
        let link = to_direct_link("https://host/open?id=XYZ", PLACEHOLDER);
        assert_eq!(link, "https://drive.google.com/uc?export=view&id=XYZ");

        let link = to_direct_link("https://host/open?usp=sharing&id=XYZ&x=1", PLACEHOLDER);
        assert!(link.ends_with("id=XYZ"));
    }

    #[test]
    fn test_to_direct_link_placeholder_for_non_urls() {
        assert_eq!(to_direct_link("not a url", PLACEHOLDER), PLACEHOLDER);
        assert_eq!(to_direct_link("", PLACEHOLDER), PLACEHOLDER);
        assert_eq!(to_direct_link("ftp://host/d/ABC", PLACEHOLDER), PLACEHOLDER);
    }

    #[test]
    fn test_to_direct_link_passes_through_other_urls() {
        let url = "https://example.com/images/poster.png";
        assert_eq!(to_direct_link(url, PLACEHOLDER), url);
    }

    #[test]
    fn test_to_direct_link_ignores_id_suffix_in_other_params() {
        let url = "https://example.com/img?uid=7";
        assert_eq!(to_direct_link(url, PLACEHOLDER), url);
    }

    #[test]
    fn test_card_applies_defaults() {
        let card = builder().card(&EventRecord::default());
        assert_eq!(card.title, "イベント");
        assert_eq!(card.action_uri, "https://line.me");
        assert_eq!(card.hero_image_url, PLACEHOLDER);
        assert_eq!(card.date_line, "開催日: ");
        assert_eq!(card.action_label, "詳細を見る");
    }

    #[test]
    fn test_card_uses_record_fields() {
        let card = builder().card(&EventRecord {
            title: Some("紅葉まつり".to_string()),
            date: Some("2026-11-03".to_string()),
            image_url: Some("https://drive.google.com/file/d/IMG9/view".to_string()),
            detail_url: Some("https://example.com/momiji".to_string()),
        });
        assert_eq!(card.title, "紅葉まつり");
        assert_eq!(card.date_line, "開催日: 2026-11-03");
        assert_eq!(
            card.hero_image_url,
            "https://drive.google.com/uc?export=view&id=IMG9"
        );
        assert_eq!(card.action_uri, "https://example.com/momiji");
    }

    #[test]
    fn test_build_one_card_per_record_in_order() {
        let events: Vec<_> = ["a", "b", "c"].iter().map(|t| EventRecord::titled(*t)).collect();
        let carousel = builder().build(&events).unwrap();
        assert_eq!(carousel.alt_text, "最新イベント一覧");
        let titles: Vec<_> = carousel.cards.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_build_rejects_empty_input() {
        assert!(builder().build(&[]).is_err());
    }

    #[test]
    fn test_build_caps_cards_keeping_most_recent() {
        let events: Vec<_> = (0..12).map(|i| EventRecord::titled(i.to_string())).collect();
        let carousel = builder().build(&events).unwrap();
        assert_eq!(carousel.cards.len(), MAX_CARDS);
        assert_eq!(carousel.cards[0].title, "2");
        assert_eq!(carousel.cards[MAX_CARDS - 1].title, "11");
    }

    #[test]
    fn test_build_rejects_blank_alt_text() {
        let builder = EventCarouselBuilder::new(EventsConfig {
            alt_text: "  ".to_string(),
            ..EventsConfig::default()
        });
        assert!(builder.build(&[EventRecord::titled("a")]).is_err());
    }

    #[test]
    fn test_card_non_url_detail_falls_back_to_default_link() {
        let card = builder().card(&EventRecord {
            detail_url: Some("TBD".to_string()),
            ..EventRecord::titled("花火")
        });
        assert_eq!(card.action_uri, "https://line.me");
    }
}
