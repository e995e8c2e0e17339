use async_trait::async_trait;
use banana_core::{BananaConfig, BananaResult, DEFAULT_MODEL};
use std::sync::Arc;
use tracing::{debug, info};

use super::grounding::{generate_grounded, grounding_notice, text_notice};
use crate::backend::{BackendProvider, EnvBackendProvider};
use crate::codec::{ImageCodec, PixelBuffer, PngCodec};
use crate::node::{Node, NodeOutput};
use crate::options::{
    validate_image_count, validate_model, validate_prompt, validate_reference_images,
    GenerationOptions,
};

#[derive(Debug, Clone)]
pub struct NanoBananaAioInputs {
    pub model_name: String,
    pub prompt: String,
    pub image_count: u32,
    pub use_search: bool,
    pub images: Vec<PixelBuffer>,
    pub aspect_ratio: String,
    pub image_size: String,
    pub temperature: f32,
}

impl Default for NanoBananaAioInputs {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            prompt: "A futuristic nano banana dish".to_string(),
            image_count: 1,
            use_search: true,
            images: Vec::new(),
            aspect_ratio: "1:1".to_string(),
            image_size: "2K".to_string(),
            temperature: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NanoBananaAioOutputs {
    /// One frame per generated image
    pub images: PixelBuffer,
    pub thinking: String,
    pub grounding_sources: String,
}

impl NodeOutput for NanoBananaAioOutputs {
    fn placeholder() -> Self {
        Self {
            images: PixelBuffer::placeholder(),
            thinking: String::new(),
            grounding_sources: String::new(),
        }
    }
}

/// Single or batched generation with optional search grounding
pub struct NanoBananaAio {
    provider: Arc<dyn BackendProvider>,
    codec: Arc<dyn ImageCodec>,
}

impl NanoBananaAio {
    pub fn new(config: BananaConfig) -> Self {
        Self::with_provider(Arc::new(EnvBackendProvider::new(config)))
    }

    pub fn with_provider(provider: Arc<dyn BackendProvider>) -> Self {
        Self {
            provider,
            codec: Arc::new(PngCodec),
        }
    }
}

#[async_trait]
impl Node for NanoBananaAio {
    const NAME: &'static str = "NanoBananaAIO";
    const DISPLAY_NAME: &'static str = "Nano Banana AIO";
    const RETURN_NAMES: &'static [&'static str] = &["images", "thinking", "grounding_sources"];

    type Inputs = NanoBananaAioInputs;
    type Outputs = NanoBananaAioOutputs;

    async fn try_run(&mut self, inputs: NanoBananaAioInputs) -> BananaResult<NanoBananaAioOutputs> {
        let backend = self.provider.backend()?;

        validate_prompt(&inputs.prompt)?;
        validate_model(&inputs.model_name)?;
        let options =
            GenerationOptions::parse(&inputs.aspect_ratio, &inputs.image_size, inputs.temperature)?;
        validate_image_count(inputs.image_count)?;
        validate_reference_images(inputs.images.len())?;

        let count = inputs.image_count;
        info!(node = Self::NAME, count, model = %inputs.model_name, "Generating images");

        let mut frames = Vec::with_capacity(count as usize);
        let mut texts = Vec::with_capacity(count as usize);
        let mut documents = Vec::with_capacity(count as usize);

        for i in 1..=count {
            let prompt = if count == 1 {
                inputs.prompt.clone()
            } else {
                format!("{} (Image {} of {})", inputs.prompt, i, count)
            };
            debug!(iteration = i, "Requesting image");

            let generated = generate_grounded(
                &backend,
                self.codec.as_ref(),
                &inputs.model_name,
                &prompt,
                &inputs.images,
                &options,
                inputs.use_search,
            )
            .await?;

            frames.push(generated.image);
            texts.push(generated.text);
            documents.push(generated.grounding);
        }

        let images = PixelBuffer::concat(frames)?;
        let grounding_sources = documents.join("\n\n");

        if backend.convention.is_api_key() {
            return Ok(NanoBananaAioOutputs {
                images,
                thinking: text_notice(count > 1),
                grounding_sources: grounding_notice(&grounding_sources),
            });
        }

        Ok(NanoBananaAioOutputs {
            images,
            thinking: texts.join("\n\n"),
            grounding_sources,
        })
    }
}
