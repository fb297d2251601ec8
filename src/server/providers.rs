//! LLM provider resolution

use super::config::LlmConfig;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use stepwright_llm::{GeminiConfig, GeminiProvider, LlmProvider};
use tracing::info;

/// Build the configured text-generation provider
pub fn resolve_llm_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.as_str() {
        "gemini" => {
            let mut gemini = if config.api_key.trim().is_empty() {
                GeminiConfig::from_env().context("Gemini API key not configured")?
            } else {
                GeminiConfig::new(config.api_key.trim())
            };
            if !config.model.is_empty() {
                gemini = gemini.with_model(&config.model);
            }
            if !config.base_url.is_empty() {
                gemini = gemini.with_base_url(&config.base_url);
            }
            gemini = gemini
                .with_max_tokens(config.max_tokens)
                .with_timeout(Duration::from_secs(config.timeout_secs));

            let provider = GeminiProvider::new(gemini).context("Failed to create Gemini provider")?;
            info!(model = %provider.config().default_model, "Registered Gemini provider");
            Ok(Arc::new(provider))
        }
        other => bail!("unsupported llm provider: {}", other),
    }
}
