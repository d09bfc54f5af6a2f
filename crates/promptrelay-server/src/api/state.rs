use std::sync::Arc;

use promptrelay_client::{ChatTransport, ClientConfig, GeminiClient, GenerationConfig};

/// Shared handler state: the upstream transport holding the credential.
///
/// Construction is an explicit startup step; a missing credential fails
/// here, once, instead of on the first request.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn ChatTransport>,
}

impl AppState {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            anyhow::anyhow!("GEMINI_API_KEY is not set; the relay cannot reach the upstream model")
        })?;

        let config = ClientConfig::from_env();
        let upstream = GeminiClient::new(api_key)
            .with_model(config.model.clone())
            .with_generation(GenerationConfig {
                max_output_tokens: config.max_output_tokens,
                ..Default::default()
            });

        Ok(Self {
            upstream: Arc::new(upstream),
        })
    }

    pub fn with_upstream(upstream: Arc<dyn ChatTransport>) -> Self {
        Self { upstream }
    }
}
