// ABOUTME: Classifies inbound text into a fixed set of handling variants
// ABOUTME: Exact trigger match first, then keyword containment, otherwise free-form

use crate::config::IntentConfig;

/// Handling category of an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Text equals the trigger phrase
    Activate,
    /// Text mentions one of the event keywords
    ListEvents,
    /// Anything else, answered by the generation backend
    FreeForm,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Activate => "activate",
            Intent::ListEvents => "list_events",
            Intent::FreeForm => "free_form",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntentRouter {
    trigger_phrase: String,
    keywords: Vec<String>,
}

impl IntentRouter {
    pub fn new(trigger_phrase: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            trigger_phrase: trigger_phrase.into().trim().to_string(),
            keywords: keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &IntentConfig) -> Self {
        Self::new(config.trigger_phrase.clone(), config.event_keywords.clone())
    }

    /// Precedence is fixed: Activate, then ListEvents, then FreeForm.
    pub fn classify(&self, text: &str) -> Intent {
        let text = text.trim();
        if text == self.trigger_phrase {
            return Intent::Activate;
        }
        if self.keywords.iter().any(|k| text.contains(k.as_str())) {
            return Intent::ListEvents;
        }
        Intent::FreeForm
    }
}
