use async_trait::async_trait;
use banana_core::{
    BananaConfig, BananaResult, ChatSession, Modality, Part, ToolConfig, DEFAULT_MODEL,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{BackendProvider, EnvBackendProvider};
use crate::codec::{ImageCodec, PixelBuffer, PngCodec};
use crate::node::{Node, NodeOutput};
use crate::options::{validate_model, validate_prompt, GenerationOptions};
use crate::response::{parse_image_response, response_metadata};
use crate::session::{ContentItem, ConversationState, InlineImage};

#[derive(Debug, Clone)]
pub struct MultiTurnChatInputs {
    pub model_name: String,
    pub prompt: String,
    /// Clears the conversation before this turn
    pub reset_chat: bool,
    pub aspect_ratio: String,
    pub image_size: String,
    pub temperature: f32,
    /// Starting image, only used on the first turn
    pub image_input: Option<PixelBuffer>,
}

impl Default for MultiTurnChatInputs {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            prompt: "Create an image of a clear perfume bottle sitting on a vanity.".to_string(),
            reset_chat: false,
            aspect_ratio: "1:1".to_string(),
            image_size: "2K".to_string(),
            temperature: 1.0,
            image_input: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiTurnChatOutputs {
    pub image: PixelBuffer,
    pub response_text: String,
    pub metadata: String,
    /// JSON array of `{prompt, response, timestamp}` turns
    pub chat_history: String,
}

impl NodeOutput for MultiTurnChatOutputs {
    fn placeholder() -> Self {
        Self {
            image: PixelBuffer::placeholder(),
            response_text: String::new(),
            metadata: String::new(),
            chat_history: String::new(),
        }
    }
}

/// Iterative image editing that feeds each result back as the next turn's context.
///
/// The model keeps no state between calls. Each turn opens a fresh chat with the
/// last produced image and the new prompt.
pub struct NanoBananaMultiTurnChat {
    provider: Arc<dyn BackendProvider>,
    codec: Arc<dyn ImageCodec>,
    state: ConversationState,
    preview_warning_shown: bool,
}

impl NanoBananaMultiTurnChat {
    pub fn new(config: BananaConfig) -> Self {
        Self::with_provider(Arc::new(EnvBackendProvider::new(config)))
    }

    pub fn with_provider(provider: Arc<dyn BackendProvider>) -> Self {
        Self {
            provider,
            codec: Arc::new(PngCodec),
            state: ConversationState::new(),
            preview_warning_shown: false,
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state.reset();
        info!("Chat session reset.");
    }

    fn warn_preview_once(&mut self, model_name: &str) {
        if model_name.contains("preview") && !self.preview_warning_shown {
            warn!(
                model = %model_name,
                "Using preview model {} which may have unstable tool support", model_name
            );
            self.preview_warning_shown = true;
        }
    }
}

#[async_trait]
impl Node for NanoBananaMultiTurnChat {
    const NAME: &'static str = "NanoBananaMultiTurnChat";
    const DISPLAY_NAME: &'static str = "Nano Banana Multi-Turn Chat";
    const RETURN_NAMES: &'static [&'static str] =
        &["image", "response_text", "metadata", "chat_history"];

    type Inputs = MultiTurnChatInputs;
    type Outputs = MultiTurnChatOutputs;

    async fn try_run(&mut self, inputs: MultiTurnChatInputs) -> BananaResult<MultiTurnChatOutputs> {
        let backend = self.provider.backend()?;

        validate_prompt(&inputs.prompt)?;
        validate_model(&inputs.model_name)?;
        let options =
            GenerationOptions::parse(&inputs.aspect_ratio, &inputs.image_size, inputs.temperature)?;

        if inputs.reset_chat {
            self.reset();
        }
        self.warn_preview_once(&inputs.model_name);

        let seed = match &inputs.image_input {
            Some(image) if self.state.is_empty() => Some(InlineImage::new(
                PngCodec::MIME_TYPE,
                self.codec.encode(image)?,
            )),
            _ => None,
        };
        let parts: Vec<Part> = self
            .state
            .build_context(&inputs.prompt, seed.as_ref())
            .iter()
            .map(ContentItem::to_part)
            .collect();
        debug!(
            turn = self.state.turns().len() + 1,
            with_image = parts.len() > 1,
            "Sending chat turn"
        );

        let mut chat = ChatSession::new(
            inputs.model_name.clone(),
            Some(options.generation_config(vec![Modality::Text, Modality::Image])),
        )
        .with_tool_config(ToolConfig::no_function_calls());
        let response = chat.send_message(backend.client.as_ref(), parts).await?;

        let parsed = parse_image_response(&response)?;
        let image = self.codec.decode(&parsed.image.bytes)?;
        let metadata = response_metadata(&response);

        self.state
            .record_turn(&inputs.prompt, parsed.image, &parsed.text);
        info!(turns = self.state.turns().len(), "Chat turn complete");

        Ok(MultiTurnChatOutputs {
            image,
            response_text: parsed.text,
            metadata,
            chat_history: self.state.turn_log()?,
        })
    }
}
