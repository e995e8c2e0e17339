use banana_core::auth::{default_token_source, token_source_with};
use banana_core::{
    BananaConfig, BananaResult, CallingConvention, GeminiClient, ModelClient, TokenSource,
};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A resolved calling convention and the client that speaks it
#[derive(Clone)]
pub struct Backend {
    pub convention: CallingConvention,
    pub client: Arc<dyn ModelClient>,
}

/// Resolves credentials and a client for each node invocation
pub trait BackendProvider: Send + Sync {
    fn backend(&self) -> BananaResult<Backend>;
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads credentials from the environment on every call, so edits to `.env`
/// apply without restarting the host.
///
/// The Vertex AI token source outlives a single call and is only rebuilt when
/// the resolved convention changes, so cached access tokens carry over between
/// turns.
pub struct EnvBackendProvider {
    config: BananaConfig,
    lookup: Option<EnvLookup>,
    token_source: Mutex<Option<(CallingConvention, Arc<dyn TokenSource>)>>,
}

impl EnvBackendProvider {
    pub fn new(config: BananaConfig) -> Self {
        Self {
            config,
            lookup: None,
            token_source: Mutex::new(None),
        }
    }

    /// Resolves variables through `lookup` instead of the process environment
    pub fn with_lookup<F>(config: BananaConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            config,
            lookup: Some(Arc::new(lookup)),
            token_source: Mutex::new(None),
        }
    }

    fn detect(&self) -> BananaResult<CallingConvention> {
        match &self.lookup {
            Some(lookup) => CallingConvention::detect_with(&self.config, |name| lookup(name)),
            None => CallingConvention::detect_from(&self.config),
        }
    }

    fn token_source_for(
        &self,
        convention: &CallingConvention,
    ) -> BananaResult<Arc<dyn TokenSource>> {
        let mut cached = self
            .token_source
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some((cached_for, source)) = cached.as_ref() {
            if cached_for == convention {
                return Ok(source.clone());
            }
            debug!("Calling convention changed, rebuilding token source");
        }

        let source = match &self.lookup {
            Some(lookup) => token_source_with(|name| lookup(name))?,
            None => default_token_source()?,
        };
        *cached = Some((convention.clone(), source.clone()));
        Ok(source)
    }
}

impl BackendProvider for EnvBackendProvider {
    fn backend(&self) -> BananaResult<Backend> {
        let convention = self.detect()?;
        debug!(?convention, "Resolved calling convention");

        let token_source = match convention {
            CallingConvention::VertexAi { .. } => Some(self.token_source_for(&convention)?),
            CallingConvention::ApiKey { .. } => None,
        };
        let client = GeminiClient::with_token_source(convention.clone(), &self.config, token_source)?;
        Ok(Backend {
            convention,
            client: Arc::new(client),
        })
    }
}

/// Always hands out the same backend. Useful for embedding a custom client.
#[derive(Clone)]
pub struct StaticBackend(pub Backend);

impl BackendProvider for StaticBackend {
    fn backend(&self) -> BananaResult<Backend> {
        Ok(self.0.clone())
    }
}
