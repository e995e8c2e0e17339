pub mod aio;
pub mod basic;
pub mod grounding;
pub mod multiturn;

pub use aio::{NanoBananaAio, NanoBananaAioInputs, NanoBananaAioOutputs};
pub use basic::{NanoBanana, NanoBananaInputs, NanoBananaOutputs};
pub use grounding::{NanoBananaGrounding, NanoBananaGroundingInputs, NanoBananaGroundingOutputs};
pub use multiturn::{NanoBananaMultiTurnChat, MultiTurnChatInputs, MultiTurnChatOutputs};

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use banana_core::{
        BananaError, BananaResult, CallingConvention, Candidate, Content, FinishReason,
        GenerateContentRequest, GenerateContentResponse, GroundingMetadata, ModelClient, Part,
    };
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use crate::backend::{Backend, BackendProvider, StaticBackend};
    use crate::codec::{ImageCodec, PixelBuffer, PngCodec};

    /// Replays scripted results and records every request it sees
    pub struct MockClient {
        script: Mutex<VecDeque<BananaResult<GenerateContentResponse>>>,
        requests: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl MockClient {
        pub fn new(script: Vec<BananaResult<GenerateContentResponse>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn requests(&self) -> Vec<(String, serde_json::Value)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelClient for MockClient {
        async fn generate_content(
            &self,
            model: &str,
            request: &GenerateContentRequest,
        ) -> BananaResult<GenerateContentResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((model.to_string(), serde_json::to_value(request).unwrap()));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BananaError::UpstreamError("script exhausted".into())))
        }
    }

    fn provider(convention: CallingConvention, client: Arc<MockClient>) -> Arc<dyn BackendProvider> {
        Arc::new(StaticBackend(Backend { convention, client }))
    }

    pub fn api_backend(client: Arc<MockClient>) -> Arc<dyn BackendProvider> {
        provider(
            CallingConvention::ApiKey {
                api_key: "test-key".into(),
            },
            client,
        )
    }

    pub fn vertex_backend(client: Arc<MockClient>) -> Arc<dyn BackendProvider> {
        provider(
            CallingConvention::VertexAi {
                project_id: "test-project".into(),
                location: "us-central1".into(),
            },
            client,
        )
    }

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        PngCodec
            .encode(&PixelBuffer::zeros(1, height, width))
            .unwrap()
    }

    pub fn grounded_response(
        width: u32,
        height: u32,
        text: &str,
        grounding: Option<GroundingMetadata>,
    ) -> GenerateContentResponse {
        let mut parts = Vec::new();
        if !text.is_empty() {
            parts.push(Part::text(text));
        }
        parts.push(Part::inline_image("image/png", &png_bytes(width, height)));

        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    parts,
                    role: Some("model".into()),
                }),
                finish_reason: Some(FinishReason::Stop),
                grounding_metadata: grounding,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    pub fn image_response(width: u32, height: u32, text: &str) -> GenerateContentResponse {
        grounded_response(width, height, text, None)
    }

    pub fn finished_with(reason: FinishReason) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                finish_reason: Some(reason),
                ..Default::default()
            }],
            ..Default::default()
        }
    }
}
