use async_trait::async_trait;
use banana_core::{BananaResult, Part};
use tracing::error;

use crate::codec::{ImageCodec, PixelBuffer, PngCodec};

/// Host category every node is listed under
pub const CATEGORY: &str = "Ru4ls/NanoBanana";

pub(crate) const VERTEX_SETUP_URL: &str =
    "https://cloud.google.com/vertex-ai/docs/generative-ai/learn/quickstarts";

/// Fixed-arity outputs with a shape-compatible value for failures
pub trait NodeOutput: Sized {
    fn placeholder() -> Self;
}

/// One callable unit of the host graph.
///
/// `run` never fails: errors are logged and turned into the placeholder
/// output so the host never sees a shape mismatch.
#[async_trait]
pub trait Node: Send {
    const NAME: &'static str;
    const DISPLAY_NAME: &'static str;
    const CATEGORY: &'static str = CATEGORY;
    const RETURN_NAMES: &'static [&'static str];

    type Inputs: Send + 'static;
    type Outputs: NodeOutput + Send;

    async fn try_run(&mut self, inputs: Self::Inputs) -> BananaResult<Self::Outputs>;

    async fn run(&mut self, inputs: Self::Inputs) -> Self::Outputs {
        match self.try_run(inputs).await {
            Ok(outputs) => outputs,
            Err(e) => {
                error!(node = Self::NAME, "ERROR: {}", e);
                Self::Outputs::placeholder()
            }
        }
    }
}

/// `[prompt, image_1, image_2, …]`, images encoded as PNG
pub(crate) fn reference_parts(
    codec: &dyn ImageCodec,
    prompt: &str,
    images: &[PixelBuffer],
) -> BananaResult<Vec<Part>> {
    let mut parts = Vec::with_capacity(images.len() + 1);
    parts.push(Part::text(prompt));
    for image in images {
        parts.push(Part::inline_image(PngCodec::MIME_TYPE, &codec.encode(image)?));
    }
    Ok(parts)
}
