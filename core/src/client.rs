use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::{default_token_source, CallingConvention, TokenSource};
use crate::config::BananaConfig;
use crate::errors::{BananaError, BananaResult};
use crate::types::*;

const API_KEY_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const VERTEX_GLOBAL_BASE_URL: &str = "https://aiplatform.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// A model that answers `generateContent` requests.
///
/// Nodes only talk to this trait, so tests and alternative transports can stand
/// in for the HTTP client.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> BananaResult<GenerateContentResponse>;
}

/// The image models are only served from the global Vertex AI endpoint
pub fn effective_location(model: &str, location: &str) -> String {
    if model.contains("gemini-3-pro") {
        "global".to_string()
    } else {
        location.to_string()
    }
}

/// HTTP client for the Gemini API, under either calling convention
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    convention: CallingConvention,
    token_source: Option<Arc<dyn TokenSource>>,
    base_url: Option<String>,
}

impl GeminiClient {
    /// Create a client for the detected calling convention.
    ///
    /// Vertex AI clients pick their token source from the environment.
    pub fn new(convention: CallingConvention, config: &BananaConfig) -> BananaResult<Self> {
        let token_source = match convention {
            CallingConvention::VertexAi { .. } => Some(default_token_source()?),
            CallingConvention::ApiKey { .. } => None,
        };
        Self::with_token_source(convention, config, token_source)
    }

    pub fn with_token_source(
        convention: CallingConvention,
        config: &BananaConfig,
        token_source: Option<Arc<dyn TokenSource>>,
    ) -> BananaResult<Self> {
        if matches!(convention, CallingConvention::VertexAi { .. }) && token_source.is_none() {
            return Err(BananaError::ConfigError(
                "Vertex AI requires an access token source".to_string(),
            ));
        }

        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| {
            BananaError::ConfigError(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            convention,
            token_source,
            base_url: config.base_url.clone(),
        })
    }

    pub fn convention(&self) -> &CallingConvention {
        &self.convention
    }

    /// Full `generateContent` URL for a model
    pub fn endpoint(&self, model: &str) -> String {
        match &self.convention {
            CallingConvention::ApiKey { .. } => format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url.as_deref().unwrap_or(API_KEY_BASE_URL),
                model
            ),
            CallingConvention::VertexAi {
                project_id,
                location,
            } => {
                let location = effective_location(model, location);
                let host = match &self.base_url {
                    Some(base) => base.clone(),
                    None if location == "global" => VERTEX_GLOBAL_BASE_URL.to_string(),
                    None => format!("https://{}-aiplatform.googleapis.com", location),
                };
                format!(
                    "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
                    host, project_id, location, model
                )
            }
        }
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> BananaResult<GenerateContentResponse> {
        let url = self.endpoint(model);
        info!(
            model,
            convention = self.convention.label(),
            contents = request.contents.len(),
            "Sending generateContent request"
        );

        let mut builder = self.client.post(&url).json(request);
        builder = match &self.convention {
            CallingConvention::ApiKey { api_key } => builder.header(API_KEY_HEADER, api_key),
            CallingConvention::VertexAi { .. } => {
                let source = self.token_source.as_ref().ok_or_else(|| {
                    BananaError::ConfigError("Vertex AI requires an access token".to_string())
                })?;
                let token = source.access_token().await?;
                let value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| BananaError::AuthError(format!("Invalid access token: {}", e)))?;
                builder.header(AUTHORIZATION, value)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| BananaError::RequestError(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.map_err(|e| {
                BananaError::RequestError(format!("Failed to read error response: {}", e))
            })?;
            warn!(status = status.as_u16(), "generateContent request failed");

            return Err(BananaError::HttpError {
                status_code: status.as_u16(),
                message: format!("API request failed: {}", error_body),
            });
        }

        let body = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| BananaError::ParsingError(format!("Failed to parse response: {}", e)))?;

        debug!(candidates = body.candidates.len(), "Received generateContent response");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> BananaConfig {
        BananaConfig {
            base_url: Some(server.uri()),
            ..BananaConfig::default()
        }
    }

    fn ok_body() -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "done"}]},
                "finishReason": "STOP"
            }]
        })
    }

    fn simple_request() -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text("draw")])],
            ..Default::default()
        }
    }

    #[test]
    fn test_vertex_endpoints() {
        let convention = CallingConvention::VertexAi {
            project_id: "proj".into(),
            location: "us-central1".into(),
        };
        let client = GeminiClient::with_token_source(
            convention,
            &BananaConfig::default(),
            Some(Arc::new(StaticToken("t".into()))),
        )
        .unwrap();

        assert_eq!(
            client.endpoint("gemini-3-pro-image-preview"),
            "https://aiplatform.googleapis.com/v1/projects/proj/locations/global/publishers/google/models/gemini-3-pro-image-preview:generateContent"
        );
        assert_eq!(
            client.endpoint("gemini-2.5-flash-image"),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/proj/locations/us-central1/publishers/google/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[test]
    fn test_vertex_requires_token_source() {
        let convention = CallingConvention::VertexAi {
            project_id: "proj".into(),
            location: "us-central1".into(),
        };
        let err =
            GeminiClient::with_token_source(convention, &BananaConfig::default(), None).unwrap_err();
        assert!(matches!(err, BananaError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_api_key_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-3-pro-image-preview:generateContent"))
            .and(header("x-goog-api-key", "secret"))
            .and(body_partial_json(json!({"contents": [{"parts": [{"text": "draw"}]}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(
            CallingConvention::ApiKey {
                api_key: "secret".into(),
            },
            &config_for(&server),
        )
        .unwrap();

        let response = client
            .generate_content("gemini-3-pro-image-preview", &simple_request())
            .await
            .unwrap();
        assert_eq!(response.first_candidate().unwrap().text(), "done");
    }

    #[tokio::test]
    async fn test_vertex_request_uses_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/v1/projects/proj/locations/global/publishers/google/models/gemini-3-pro-image-preview:generateContent",
            ))
            .and(header("authorization", "Bearer ya29.token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::with_token_source(
            CallingConvention::VertexAi {
                project_id: "proj".into(),
                location: "us-central1".into(),
            },
            &config_for(&server),
            Some(Arc::new(StaticToken("ya29.token".into()))),
        )
        .unwrap();

        let response = client
            .generate_content("gemini-3-pro-image-preview", &simple_request())
            .await
            .unwrap();
        assert_eq!(response.candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad aspect ratio"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(
            CallingConvention::ApiKey {
                api_key: "secret".into(),
            },
            &config_for(&server),
        )
        .unwrap();

        let err = client
            .generate_content("gemini-3-pro-image-preview", &simple_request())
            .await
            .unwrap_err();
        match err {
            BananaError::HttpError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 400);
                assert!(message.contains("bad aspect ratio"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_parsing_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(
            CallingConvention::ApiKey {
                api_key: "secret".into(),
            },
            &config_for(&server),
        )
        .unwrap();

        let err = client
            .generate_content("m", &simple_request())
            .await
            .unwrap_err();
        assert!(matches!(err, BananaError::ParsingError(_)));
    }
}
