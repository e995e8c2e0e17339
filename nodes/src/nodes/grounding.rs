use async_trait::async_trait;
use banana_core::{
    BananaConfig, BananaResult, Content, GenerateContentRequest, Modality, DEFAULT_MODEL,
};
use std::sync::Arc;
use tracing::info;

use crate::backend::{Backend, BackendProvider, EnvBackendProvider};
use crate::citations::render_grounding;
use crate::codec::{ImageCodec, PixelBuffer, PngCodec};
use crate::node::{reference_parts, Node, NodeOutput, VERTEX_SETUP_URL};
use crate::options::{
    search_tools, validate_model, validate_prompt, validate_reference_images, GenerationOptions,
};
use crate::response::parse_image_response;

#[derive(Debug, Clone)]
pub struct NanoBananaGroundingInputs {
    pub model_name: String,
    pub prompt: String,
    pub use_search: bool,
    pub images: Vec<PixelBuffer>,
    pub aspect_ratio: String,
    pub image_size: String,
    pub temperature: f32,
}

impl Default for NanoBananaGroundingInputs {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            prompt: "Search for and visualize the current weather forecast for the next 5 days in San Francisco in a clean, modern weather chart. Add a visual of what I could wear each day.".to_string(),
            use_search: true,
            images: Vec::new(),
            aspect_ratio: "1:1".to_string(),
            image_size: "2K".to_string(),
            temperature: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NanoBananaGroundingOutputs {
    pub image: PixelBuffer,
    pub text_response: String,
    pub grounding_sources: String,
}

impl NodeOutput for NanoBananaGroundingOutputs {
    fn placeholder() -> Self {
        Self {
            image: PixelBuffer::placeholder(),
            text_response: String::new(),
            grounding_sources: String::new(),
        }
    }
}

/// One grounded generation: the decoded image, the model's text and the
/// rendered citation document.
pub(crate) struct GroundedImage {
    pub image: PixelBuffer,
    pub text: String,
    pub grounding: String,
}

/// Shared by the grounding and all-in-one nodes
pub(crate) async fn generate_grounded(
    backend: &Backend,
    codec: &dyn ImageCodec,
    model_name: &str,
    prompt: &str,
    images: &[PixelBuffer],
    options: &GenerationOptions,
    use_search: bool,
) -> BananaResult<GroundedImage> {
    let request = GenerateContentRequest {
        contents: vec![Content::user(reference_parts(codec, prompt, images)?)],
        tools: search_tools(&backend.convention, model_name, use_search),
        generation_config: Some(options.generation_config(vec![Modality::Text, Modality::Image])),
        ..Default::default()
    };

    info!(
        model = %model_name,
        search = request.tools.is_some(),
        references = images.len(),
        "Generating grounded image"
    );
    let response = backend.client.generate_content(model_name, &request).await?;
    let parsed = parse_image_response(&response)?;
    let grounding = render_grounding(&parsed.text, parsed.grounding.as_ref());
    let image = codec.decode(&parsed.image.bytes)?;

    Ok(GroundedImage {
        image,
        text: parsed.text,
        grounding,
    })
}

pub(crate) fn text_notice(plural: bool) -> String {
    format!(
        "To access the full text {}, please use Vertex AI approach with PROJECT_ID and LOCATION set up. Visit {} for setup instructions.",
        if plural { "responses" } else { "response" },
        VERTEX_SETUP_URL
    )
}

pub(crate) fn grounding_notice(grounding: &str) -> String {
    format!(
        "{}\n\nFor full grounding capabilities, please use Vertex AI approach with PROJECT_ID and LOCATION configured.\nVisit {} for setup instructions.",
        grounding, VERTEX_SETUP_URL
    )
}

/// Image generation with Google Search grounding and citations
pub struct NanoBananaGrounding {
    provider: Arc<dyn BackendProvider>,
    codec: Arc<dyn ImageCodec>,
}

impl NanoBananaGrounding {
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
impl Node for NanoBananaGrounding {
    const NAME: &'static str = "NanoBananaGrounding";
    const DISPLAY_NAME: &'static str = "Nano Banana Grounding";
    const RETURN_NAMES: &'static [&'static str] = &["image", "text_response", "grounding_sources"];

    type Inputs = NanoBananaGroundingInputs;
    type Outputs = NanoBananaGroundingOutputs;

    async fn try_run(
        &mut self,
        inputs: NanoBananaGroundingInputs,
    ) -> BananaResult<NanoBananaGroundingOutputs> {
        let backend = self.provider.backend()?;

        validate_prompt(&inputs.prompt)?;
        validate_model(&inputs.model_name)?;
        let options =
            GenerationOptions::parse(&inputs.aspect_ratio, &inputs.image_size, inputs.temperature)?;
        validate_reference_images(inputs.images.len())?;

        let generated = generate_grounded(
            &backend,
            self.codec.as_ref(),
            &inputs.model_name,
            &inputs.prompt,
            &inputs.images,
            &options,
            inputs.use_search,
        )
        .await?;

        if backend.convention.is_api_key() {
            return Ok(NanoBananaGroundingOutputs {
                image: generated.image,
                text_response: text_notice(false),
                grounding_sources: grounding_notice(&generated.grounding),
            });
        }

        Ok(NanoBananaGroundingOutputs {
            image: generated.image,
            text_response: generated.text,
            grounding_sources: generated.grounding,
        })
    }
}
