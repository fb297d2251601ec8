//! Application configuration types

use serde::Deserialize;
use std::path::PathBuf;
use stepwright_browser::BrowserConfig;
use stepwright_channels::NatsConfig;
use stepwright_core::{PostgresSinkConfig, RetryPolicy, SynthesizerConfig};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub executor: RetryPolicy,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

/// Text-generation backend (`[llm]`)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name; only `gemini` is built in
    pub provider: String,
    /// API key; empty falls back to the provider's environment variables
    pub api_key: String,
    /// Model name; empty selects the provider default
    pub model: String,
    /// Base URL override
    pub base_url: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token cap
    pub max_tokens: u32,
    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let synth = SynthesizerConfig::default();
        Self {
            provider: "gemini".to_string(),
            api_key: String::new(),
            model: String::new(),
            base_url: String::new(),
            temperature: synth.temperature,
            max_tokens: synth.max_tokens,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Generation settings for the synthesizer
    pub fn synthesizer(&self) -> SynthesizerConfig {
        SynthesizerConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Screenshot output (`[artifacts]`)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
    pub full_page: bool,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("screenshots"),
            full_page: true,
        }
    }
}

/// Job intake (`[intake]`)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Jobs buffered between the listener and the execution loop
    pub queue_capacity: usize,
    pub nats: NatsConfig,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            nats: NatsConfig::default(),
        }
    }
}

/// Where step status updates go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Log,
    Postgres,
}

/// Status reporting (`[status]`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub sink: SinkKind,
    pub postgres: PostgresSinkConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.executor.max_retries, 4);
        assert_eq!(config.intake.queue_capacity, 16);
        assert_eq!(config.status.sink, SinkKind::Log);
        assert_eq!(config.status.postgres.table, "test_steps");
        assert_eq!(config.artifacts.dir, PathBuf::from("screenshots"));
        assert_eq!(config.llm.provider, "gemini");
    }

    #[test]
    fn test_synthesizer_settings() {
        let config: LlmConfig =
            serde_json::from_str(r#"{"model": "gemini-2.5-pro", "temperature": 0.0}"#).unwrap();
        let synth = config.synthesizer();
        assert_eq!(synth.model, "gemini-2.5-pro");
        assert_eq!(synth.temperature, 0.0);
        assert_eq!(synth.max_tokens, 2048);
    }
}
