use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::info;

use super::gemini::GeminiProvider;
use super::huggingface::HuggingFaceProvider;
use super::openai_compat::OpenAiCompatibleProvider;
use super::{AiProvider, ProviderError, ProviderKind};
use crate::config::ProviderConfig;

/// Build a client for every configured provider
///
/// Providers without an API key are skipped. All clients share one
/// connection pool and the given per-request timeout.
pub fn build_providers(
    configs: &[ProviderConfig],
    timeout: Duration,
) -> Result<Vec<Arc<dyn AiProvider>>, ProviderError> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Http(format!("Failed to build HTTP client: {}", e)))?;

    let mut providers: Vec<Arc<dyn AiProvider>> = Vec::new();
    for config in configs {
        let api_key = match config.api_key.as_deref() {
            Some(key) if config.is_configured() => key,
            _ => continue,
        };

        let provider: Arc<dyn AiProvider> = match config.kind {
            ProviderKind::HuggingFace => {
                Arc::new(HuggingFaceProvider::new(client.clone(), api_key, config.base_url.clone()))
            }
            ProviderKind::Gemini => Arc::new(GeminiProvider::new(client.clone(), api_key, config.base_url.clone())),
            kind @ (ProviderKind::OpenRouter | ProviderKind::OpenAi) => Arc::new(OpenAiCompatibleProvider::new(
                kind,
                client.clone(),
                api_key,
                config.base_url.clone(),
            )),
        };

        info!("Registered AI provider: {} at {}", config.kind, config.base_url);
        providers.push(provider);
    }

    Ok(providers)
}
