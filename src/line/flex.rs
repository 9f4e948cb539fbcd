// ABOUTME: Renders outbound messages into LINE Messaging API message objects
// ABOUTME: Plain text becomes chunked text messages, carousels become Flex bubble carousels

use concierge_core::{Card, Carousel, OutboundMessage};
use serde_json::{json, Value};

use crate::utils::{chunk_message, MAX_CHUNK_SIZE};

/// Maximum message objects in one reply (LINE limit)
pub const MAX_MESSAGES_PER_REPLY: usize = 5;

/// Button color of the card footer action
const BUTTON_COLOR: &str = "#00b900";

/// Color of the secondary date line
const DATE_COLOR: &str = "#999999";

/// Convert a reply into LINE message objects.
///
/// Long text is split into several text messages. Anything past
/// [`MAX_MESSAGES_PER_REPLY`] is dropped with a warning, since LINE rejects
/// the whole reply otherwise.
pub fn render_messages(messages: &[OutboundMessage]) -> Vec<Value> {
    let mut rendered = Vec::new();

    for message in messages {
        match message {
            OutboundMessage::PlainText(text) => {
                for chunk in chunk_message(text, MAX_CHUNK_SIZE) {
                    rendered.push(json!({"type": "text", "text": chunk}));
                }
            }
            OutboundMessage::Carousel(carousel) => rendered.push(carousel_message(carousel)),
        }
    }

    if rendered.len() > MAX_MESSAGES_PER_REPLY {
        tracing::warn!(
            rendered = rendered.len(),
            max = MAX_MESSAGES_PER_REPLY,
            "Reply exceeds message limit, truncating"
        );
        rendered.truncate(MAX_MESSAGES_PER_REPLY);
    }

    rendered
}

/// Flex message wrapping a carousel container
pub fn carousel_message(carousel: &Carousel) -> Value {
    let bubbles: Vec<Value> = carousel.cards.iter().map(bubble).collect();
    json!({
        "type": "flex",
        "altText": carousel.alt_text,
        "contents": {
            "type": "carousel",
            "contents": bubbles
        }
    })
}

/// One bubble: hero image, title and date body, detail button footer
pub fn bubble(card: &Card) -> Value {
    json!({
        "type": "bubble",
        "hero": {
            "type": "image",
            "url": card.hero_image_url,
            "size": "full",
            "aspectRatio": "20:13",
            "aspectMode": "cover"
        },
        "body": {
            "type": "box",
            "layout": "vertical",
            "contents": [
                {
                    "type": "text",
                    "text": card.title,
                    "weight": "bold",
                    "size": "xl",
                    "wrap": true
                },
                {
                    "type": "text",
                    "text": card.date_line,
                    "size": "sm",
                    "color": DATE_COLOR,
                    "margin": "md"
                }
            ]
        },
        "footer": {
            "type": "box",
            "layout": "vertical",
            "contents": [
                {
                    "type": "button",
                    "action": {
                        "type": "uri",
                        "label": card.action_label,
                        "uri": card.action_uri
                    },
                    "style": "primary",
                    "color": BUTTON_COLOR
                }
            ]
        }
    })
}
