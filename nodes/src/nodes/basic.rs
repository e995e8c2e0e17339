use async_trait::async_trait;
use banana_core::{
    BananaConfig, BananaResult, CallingConvention, Content, GenerateContentRequest, Modality,
    DEFAULT_MODEL,
};
use std::sync::Arc;
use tracing::info;

use crate::backend::{BackendProvider, EnvBackendProvider};
use crate::codec::{ImageCodec, PixelBuffer, PngCodec};
use crate::node::{reference_parts, Node, NodeOutput, VERTEX_SETUP_URL};
use crate::options::{validate_model, validate_prompt, validate_reference_images, GenerationOptions};
use crate::response::parse_image_response;

#[derive(Debug, Clone)]
pub struct NanoBananaInputs {
    pub model_name: String,
    pub prompt: String,
    /// Up to six reference images, sent after the prompt
    pub images: Vec<PixelBuffer>,
    pub aspect_ratio: String,
    pub image_size: String,
    pub temperature: f32,
}

impl Default for NanoBananaInputs {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            prompt: "A futuristic nano banana dish".to_string(),
            images: Vec::new(),
            aspect_ratio: "1:1".to_string(),
            image_size: "2K".to_string(),
            temperature: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NanoBananaOutputs {
    pub image: PixelBuffer,
    pub thinking: String,
}

impl NodeOutput for NanoBananaOutputs {
    fn placeholder() -> Self {
        Self {
            image: PixelBuffer::placeholder(),
            thinking: String::new(),
        }
    }
}

/// Plain text(+images)-to-image generation
pub struct NanoBanana {
    provider: Arc<dyn BackendProvider>,
    codec: Arc<dyn ImageCodec>,
}

impl NanoBanana {
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

pub(crate) fn thinking_notice() -> String {
    format!(
        "To access the thinking/thought process, please use Vertex AI approach with PROJECT_ID and LOCATION configured.\nVisit {} for setup instructions.",
        VERTEX_SETUP_URL
    )
}

#[async_trait]
impl Node for NanoBanana {
    const NAME: &'static str = "NanoBanana";
    const DISPLAY_NAME: &'static str = "Nano Banana";
    const RETURN_NAMES: &'static [&'static str] = &["image", "thinking"];

    type Inputs = NanoBananaInputs;
    type Outputs = NanoBananaOutputs;

    async fn try_run(&mut self, inputs: NanoBananaInputs) -> BananaResult<NanoBananaOutputs> {
        let backend = self.provider.backend()?;

        validate_prompt(&inputs.prompt)?;
        validate_model(&inputs.model_name)?;
        let options =
            GenerationOptions::parse(&inputs.aspect_ratio, &inputs.image_size, inputs.temperature)?;
        validate_reference_images(inputs.images.len())?;

        // Text output is only surfaced through Vertex AI.
        let modalities = match backend.convention {
            CallingConvention::VertexAi { .. } => vec![Modality::Text, Modality::Image],
            CallingConvention::ApiKey { .. } => vec![Modality::Image],
        };

        let request = GenerateContentRequest {
            contents: vec![Content::user(reference_parts(
                self.codec.as_ref(),
                &inputs.prompt,
                &inputs.images,
            )?)],
            generation_config: Some(options.generation_config(modalities)),
            ..Default::default()
        };

        info!(
            node = Self::NAME,
            model = %inputs.model_name,
            references = inputs.images.len(),
            "Generating image"
        );
        let response = backend
            .client
            .generate_content(&inputs.model_name, &request)
            .await?;
        let parsed = parse_image_response(&response)?;
        let image = self.codec.decode(&parsed.image.bytes)?;

        let thinking = if backend.convention.is_api_key() {
            thinking_notice()
        } else {
            parsed.text
        };

        Ok(NanoBananaOutputs { image, thinking })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::testing::{api_backend, image_response, vertex_backend, MockClient};
    use banana_core::BananaError;

    #[tokio::test]
    async fn test_vertex_returns_image_and_text() {
        let client = MockClient::new(vec![Ok(image_response(8, 6, "Thought about bananas."))]);
        let mut node = NanoBanana::with_provider(vertex_backend(client.clone()));

        let inputs = NanoBananaInputs {
            images: vec![PixelBuffer::zeros(1, 2, 2)],
            aspect_ratio: "16:9".into(),
            ..Default::default()
        };
        let outputs = node.run(inputs).await;

        assert_eq!((outputs.image.width(), outputs.image.height()), (8, 6));
        assert_eq!(outputs.thinking, "Thought about bananas.");

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        let (model, body) = &requests[0];
        assert_eq!(model, "gemini-3-pro-image-preview");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "A futuristic nano banana dish");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(
            body["generationConfig"]["responseModalities"],
            serde_json::json!(["TEXT", "IMAGE"])
        );
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
    }

    #[tokio::test]
    async fn test_api_key_requests_image_only() {
        let client = MockClient::new(vec![Ok(image_response(4, 4, "hidden"))]);
        let mut node = NanoBanana::with_provider(api_backend(client.clone()));

        let outputs = node.run(NanoBananaInputs::default()).await;
        assert!(outputs.thinking.starts_with("To access the thinking/thought process"));

        let (_, body) = &client.requests()[0];
        assert_eq!(body["generationConfig"]["responseModalities"], serde_json::json!(["IMAGE"]));
    }

    #[tokio::test]
    async fn test_invalid_options_never_reach_the_client() {
        let client = MockClient::new(Vec::new());
        let mut node = NanoBanana::with_provider(api_backend(client.clone()));

        let outputs = node
            .run(NanoBananaInputs {
                image_size: "8K".into(),
                ..Default::default()
            })
            .await;
        assert_eq!(outputs, NanoBananaOutputs::placeholder());

        let err = node
            .try_run(NanoBananaInputs {
                prompt: "  ".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BananaError::ConfigError(_)));

        let err = node
            .try_run(NanoBananaInputs {
                images: vec![PixelBuffer::zeros(1, 1, 1); 7],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BananaError::ValidationError(_)));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_gives_placeholder() {
        let client = MockClient::new(vec![Err(BananaError::HttpError {
            status_code: 503,
            message: "overloaded".into(),
        })]);
        let mut node = NanoBanana::with_provider(vertex_backend(client));

        let outputs = node.run(NanoBananaInputs::default()).await;
        assert_eq!(outputs.image.width(), 64);
        assert!(outputs.thinking.is_empty());
    }
}
