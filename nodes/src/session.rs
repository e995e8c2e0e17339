//! Multi-turn conversation state for one node instance.
//!
//! Every exchange with the model is stateless, so continuity is approximated by
//! sending the last produced image back as context with each new prompt.

use banana_core::{BananaResult, Part};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Recorded in place of an empty model reply
pub const IMAGE_ONLY_RESPONSE: &str = "Image generated";

/// Encoded image bytes together with their MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// One item of the content sent for a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentItem {
    Image(InlineImage),
    Text(String),
}

impl ContentItem {
    pub fn to_part(&self) -> Part {
        match self {
            Self::Image(image) => Part::inline_image(image.mime_type.clone(), &image.bytes),
            Self::Text(text) => Part::text(text.clone()),
        }
    }
}

/// One prompt/response exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub prompt: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    last_image: Option<InlineImage>,
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the history and the running image together
    pub fn reset(&mut self) {
        self.last_image = None;
        self.turns.clear();
        debug!("Conversation state reset");
    }

    /// Content for the next turn: at most one image, always before the prompt.
    ///
    /// The seed image only counts before the first recorded turn; afterwards the
    /// model's own last output is the visual context.
    pub fn build_context(&self, prompt: &str, seed_image: Option<&InlineImage>) -> Vec<ContentItem> {
        let context_image = match seed_image {
            Some(seed) if self.turns.is_empty() => Some(seed),
            _ => self.last_image.as_ref(),
        };

        let mut items = Vec::with_capacity(2);
        if let Some(image) = context_image {
            items.push(ContentItem::Image(image.clone()));
        }
        items.push(ContentItem::Text(prompt.to_string()));
        items
    }

    /// Records a successful exchange. Never call this for a failed one.
    pub fn record_turn(&mut self, prompt: &str, image: InlineImage, response_text: &str) {
        let response = if response_text.is_empty() {
            IMAGE_ONLY_RESPONSE.to_string()
        } else {
            response_text.to_string()
        };

        self.last_image = Some(image);
        self.turns.push(Turn {
            prompt: prompt.to_string(),
            response,
            timestamp: Utc::now(),
        });
        debug!(turns = self.turns.len(), "Recorded conversation turn");
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last_image(&self) -> Option<&InlineImage> {
        self.last_image.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// JSON array of the recorded turns
    pub fn turn_log(&self) -> BananaResult<String> {
        Ok(serde_json::to_string(&self.turns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(tag: u8) -> InlineImage {
        InlineImage::new("image/png", vec![0x89, b'P', b'N', b'G', tag])
    }

    #[test]
    fn test_first_turn_prompt_only() {
        let state = ConversationState::new();
        assert_eq!(
            state.build_context("a cat", None),
            vec![ContentItem::Text("a cat".into())]
        );
    }

    #[test]
    fn test_seed_image_precedes_prompt_on_first_turn() {
        let state = ConversationState::new();
        let seed = png(1);
        assert_eq!(
            state.build_context("make it blue", Some(&seed)),
            vec![ContentItem::Image(seed.clone()), ContentItem::Text("make it blue".into())]
        );
    }

    #[test]
    fn test_second_turn_uses_last_image_not_seed() {
        let mut state = ConversationState::new();
        let seed = png(1);
        let produced = png(2);

        let first = state.build_context("a bottle", Some(&seed));
        assert_eq!(first[0], ContentItem::Image(seed.clone()));
        state.record_turn("a bottle", produced.clone(), "Here it is");

        let second = state.build_context("add a label", Some(&seed));
        assert_eq!(
            second,
            vec![ContentItem::Image(produced), ContentItem::Text("add a label".into())]
        );
    }

    #[test]
    fn test_turn_count_matches_recorded_turns() {
        let mut state = ConversationState::new();
        for i in 0..4 {
            state.record_turn(&format!("prompt {i}"), png(i), "");
        }
        assert_eq!(state.turns().len(), 4);
        assert_eq!(state.last_image(), Some(&png(3)));
        assert_eq!(state.turns()[0].response, IMAGE_ONLY_RESPONSE);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = ConversationState::new();
        state.record_turn("one", png(1), "first");
        state.record_turn("two", png(2), "second");

        state.reset();
        assert!(state.is_empty());
        assert!(state.last_image().is_none());
        assert_eq!(
            state.build_context("fresh", None),
            vec![ContentItem::Text("fresh".into())]
        );

        // idempotent
        state.reset();
        assert!(state.is_empty());
    }

    #[test]
    fn test_turn_log_is_json() {
        let mut state = ConversationState::new();
        assert_eq!(state.turn_log().unwrap(), "[]");

        state.record_turn("draw a fox", png(1), "A fox.");
        let parsed: Vec<Turn> = serde_json::from_str(&state.turn_log().unwrap()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].prompt, "draw a fox");
        assert_eq!(parsed[0].response, "A fox.");
    }

    #[test]
    fn test_content_items_become_parts() {
        let part = ContentItem::Image(png(7)).to_part();
        assert_eq!(part.inline_data.unwrap().mime_type, "image/png");

        let part = ContentItem::Text("hi".into()).to_part();
        assert_eq!(part.text.as_deref(), Some("hi"));
    }
}
