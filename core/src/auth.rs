//! Credential resolution.
//!
//! Two calling conventions are supported: Vertex AI (project + location, bearer
//! token) and the Generative Language API (API key). Detection mirrors the
//! `.env` layout users already have: `PROJECT_ID` + `LOCATION` select Vertex AI,
//! otherwise `GOOGLE_API_KEY` selects the API-key path.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::BananaConfig;
use crate::errors::{BananaError, BananaResult};

pub const ENV_PROJECT_ID: &str = "PROJECT_ID";
pub const ENV_LOCATION: &str = "LOCATION";
pub const ENV_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_ACCESS_TOKEN";
pub const ENV_SERVICE_ACCOUNT: &str = "GOOGLE_APPLICATION_CREDENTIALS";

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// How requests reach the model
#[derive(Clone, PartialEq, Eq)]
pub enum CallingConvention {
    VertexAi { project_id: String, location: String },
    ApiKey { api_key: String },
}

impl CallingConvention {
    /// Detects the convention from the process environment (after loading
    /// `.env`), falling back to the default config file.
    pub fn detect() -> BananaResult<Self> {
        Self::detect_from(&BananaConfig::load_default().unwrap_or_default())
    }

    /// Like [`Self::detect`], with an already loaded config as the fallback
    pub fn detect_from(config: &BananaConfig) -> BananaResult<Self> {
        dotenvy::dotenv().ok();
        Self::detect_with(config, |name| std::env::var(name).ok())
    }

    /// Detects the convention from an explicit variable lookup and config
    pub fn detect_with<F>(config: &BananaConfig, lookup: F) -> BananaResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |name: &str, fallback: &Option<String>| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| fallback.clone().filter(|v| !v.trim().is_empty()))
        };

        let project_id = pick(ENV_PROJECT_ID, &config.project_id);
        let location = pick(ENV_LOCATION, &config.location);
        let api_key = pick(ENV_API_KEY, &config.api_key);

        match (project_id, location, api_key) {
            (Some(project_id), Some(location), _) => Ok(Self::VertexAi {
                project_id,
                location,
            }),
            (_, _, Some(api_key)) => Ok(Self::ApiKey { api_key }),
            _ => Err(BananaError::ConfigError(
                "No valid credentials found. Need either PROJECT_ID + LOCATION for VertexAI or GOOGLE_API_KEY for API approach"
                    .to_string(),
            )),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VertexAi { .. } => "VERTEXAI",
            Self::ApiKey { .. } => "API",
        }
    }

    pub fn is_api_key(&self) -> bool {
        matches!(self, Self::ApiKey { .. })
    }
}

// Keep the API key out of logs.
impl fmt::Debug for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VertexAi {
                project_id,
                location,
            } => f
                .debug_struct("VertexAi")
                .field("project_id", project_id)
                .field("location", location)
                .finish(),
            Self::ApiKey { .. } => f.debug_struct("ApiKey").field("api_key", &"***").finish(),
        }
    }
}

/// Supplies OAuth bearer tokens for Vertex AI requests
#[async_trait]
pub trait TokenSource: Send + Sync + fmt::Debug {
    async fn access_token(&self) -> BananaResult<String>;
}

/// A fixed token, typically from `gcloud auth print-access-token`
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> BananaResult<String> {
        Ok(self.0.clone())
    }
}

/// The fields of a service account key file we need
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

// Never print the PEM.
impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"***")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> BananaResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BananaError::ConfigError(format!(
                "Failed to read service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            BananaError::ConfigError(format!("Invalid service account key: {}", e))
        })
    }
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges a signed JWT assertion for an access token and caches it
#[derive(Debug)]
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    http: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            http: Client::new(),
            cached: Mutex::new(None),
        }
    }

    fn token_uri(&self) -> &str {
        self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> BananaResult<String> {
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: self.token_uri(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| BananaError::AuthError(format!("Invalid private key: {}", e)))?;

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| BananaError::AuthError(format!("Failed to sign assertion: {}", e)))
    }

    async fn fetch(&self) -> BananaResult<CachedToken> {
        let now = Utc::now();
        let assertion = self.signed_assertion(now)?;

        info!(client_email = %self.key.client_email, "Requesting Vertex AI access token");
        let response = self
            .http
            .post(self.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| BananaError::AuthError(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BananaError::AuthError(format!(
                "Token exchange failed: {} - {}",
                status.as_u16(),
                body
            )));
        }

        let data: TokenResponse = response
            .json()
            .await
            .map_err(|e| BananaError::AuthError(format!("Invalid token response: {}", e)))?;

        Ok(CachedToken {
            token: data.access_token,
            expires_at: now + Duration::seconds(data.expires_in),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> BananaResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > Utc::now() {
                return Ok(token.token.clone());
            }
            debug!("Cached access token is about to expire, refreshing");
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

/// Picks a token source for Vertex AI from the environment
pub fn default_token_source() -> BananaResult<Arc<dyn TokenSource>> {
    token_source_with(|name| std::env::var(name).ok())
}

pub fn token_source_with<F>(lookup: F) -> BananaResult<Arc<dyn TokenSource>>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup(ENV_ACCESS_TOKEN).filter(|t| !t.trim().is_empty()) {
        return Ok(Arc::new(StaticToken(token)));
    }

    if let Some(path) = lookup(ENV_SERVICE_ACCOUNT).filter(|p| !p.trim().is_empty()) {
        let key = ServiceAccountKey::from_file(Path::new(&path))?;
        return Ok(Arc::new(ServiceAccountTokenSource::new(key)));
    }

    Err(BananaError::ConfigError(format!(
        "Vertex AI needs {} or {} to authenticate",
        ENV_ACCESS_TOKEN, ENV_SERVICE_ACCOUNT
    )))
}
