//! Validation of the inputs every node shares.

use banana_core::{
    AspectRatio, BananaError, BananaResult, CallingConvention, GenerationConfig, ImageConfig,
    ImageSize, Modality, Tool,
};
use std::ops::RangeInclusive;

pub const MAX_REFERENCE_IMAGES: usize = 6;
pub const IMAGE_COUNT_RANGE: RangeInclusive<u32> = 1..=10;
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=2.0;

pub fn validate_prompt(prompt: &str) -> BananaResult<()> {
    if prompt.trim().is_empty() {
        return Err(BananaError::ConfigError("Prompt cannot be empty".to_string()));
    }
    Ok(())
}

pub fn validate_model(model_name: &str) -> BananaResult<()> {
    if model_name.trim().is_empty() {
        return Err(BananaError::ConfigError("Model name is required".to_string()));
    }
    Ok(())
}

pub fn validate_image_count(image_count: u32) -> BananaResult<()> {
    if !IMAGE_COUNT_RANGE.contains(&image_count) {
        return Err(BananaError::ValidationError(format!(
            "Image count must be between {} and {}",
            IMAGE_COUNT_RANGE.start(),
            IMAGE_COUNT_RANGE.end()
        )));
    }
    Ok(())
}

pub fn validate_reference_images(count: usize) -> BananaResult<()> {
    if count > MAX_REFERENCE_IMAGES {
        return Err(BananaError::ValidationError(format!(
            "At most {} reference images are supported, got {}",
            MAX_REFERENCE_IMAGES, count
        )));
    }
    Ok(())
}

/// Parsed image options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub aspect_ratio: AspectRatio,
    pub image_size: ImageSize,
    pub temperature: f32,
}

impl GenerationOptions {
    pub fn parse(aspect_ratio: &str, image_size: &str, temperature: f32) -> BananaResult<Self> {
        let aspect_ratio = aspect_ratio.parse()?;
        let image_size = image_size.parse()?;
        if !TEMPERATURE_RANGE.contains(&temperature) {
            return Err(BananaError::ValidationError(format!(
                "Temperature must be between {} and {}, got {}",
                TEMPERATURE_RANGE.start(),
                TEMPERATURE_RANGE.end(),
                temperature
            )));
        }

        Ok(Self {
            aspect_ratio,
            image_size,
            temperature,
        })
    }

    pub fn generation_config(&self, modalities: Vec<Modality>) -> GenerationConfig {
        GenerationConfig {
            temperature: Some(self.temperature),
            response_modalities: Some(modalities),
            image_config: Some(ImageConfig {
                aspect_ratio: Some(self.aspect_ratio),
                image_size: Some(self.image_size),
            }),
            ..Default::default()
        }
    }
}

/// Google Search grounding, when requested and supported.
///
/// On Vertex AI only the `gemini-3-pro` family accepts tools alongside image
/// output.
pub fn search_tools(
    convention: &CallingConvention,
    model_name: &str,
    use_search: bool,
) -> Option<Vec<Tool>> {
    let supported = match convention {
        CallingConvention::ApiKey { .. } => true,
        CallingConvention::VertexAi { .. } => model_name.contains("gemini-3-pro"),
    };
    (use_search && supported).then(|| vec![Tool::google_search()])
}
