//! Google Gemini provider
//!
//! Speaks the `models/{model}:generateContent` REST endpoint. Rate limits
//! (429) and server errors (5xx) are retried up to twice with a short
//! backoff before the error is surfaced.

mod config;
mod security;
mod types;


pub use config::{GeminiConfig, DEFAULT_MODEL};

use crate::completion::{CompletionRequest, CompletionResponse, TokenUsage};
use crate::error::{Error, Result};
use crate::message::{Message, MessageRole};
use crate::provider::LlmProvider;
use security::sanitize_api_error;
use std::time::Duration;
use tracing::{debug, instrument};
use types::{GeminiContent, GeminiError, GeminiPart, GeminiRequest, GeminiResponse, GenerationConfig};

const MAX_RETRIES: u32 = 2;

/// Gemini provider
pub struct GeminiProvider {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create a new provider
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    /// Provider configuration
    #[must_use]
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Convert messages to Gemini format, returning system instruction separately
    pub(crate) fn convert_messages(
        messages: &[Message],
    ) -> (Option<GeminiContent>, Vec<GeminiContent>) {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for msg in messages {
            let part = GeminiPart {
                text: Some(msg.content.clone()),
            };
            match msg.role {
                MessageRole::System => system_parts.push(part),
                MessageRole::User => contents.push(GeminiContent {
                    role: Some("user".to_string()),
                    parts: vec![part],
                }),
                MessageRole::Assistant => contents.push(GeminiContent {
                    role: Some("model".to_string()),
                    parts: vec![part],
                }),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: system_parts,
            })
        };
        (system, contents)
    }

    async fn send_request(&self, model: &str, request: &GeminiRequest) -> Result<GeminiResponse> {
        for attempt in 0..=MAX_RETRIES {
            match self.send_request_once(model, request).await {
                Ok(resp) => return Ok(resp),
                Err(Error::RateLimit) if attempt < MAX_RETRIES => {
                    let delay_secs = 2 + u64::from(attempt) * 2;
                    tracing::info!(
                        attempt = attempt + 1,
                        model,
                        delay_secs,
                        "Gemini rate limited, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                }
                Err(Error::ServerError(ref msg)) if attempt < MAX_RETRIES => {
                    let delay_secs = 2 + u64::from(attempt) * 3;
                    tracing::warn!(
                        attempt = attempt + 1,
                        model,
                        delay_secs,
                        error = %msg,
                        "Gemini server error, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::RateLimit)
    }

    async fn send_request_once(&self, model: &str, request: &GeminiRequest) -> Result<GeminiResponse> {
        // SECURITY: Don't log the full URL (contains API key)
        debug!("Sending request to Gemini model: {}", model);

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            model,
            self.config.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.config.timeout.as_millis() as u64)
                } else {
                    // reqwest errors embed the URL; strip it
                    Error::Network(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.without_url().to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = %status, "Gemini API error response");
            if status.as_u16() == 429 {
                return Err(Error::RateLimit);
            }
            let detail = serde_json::from_str::<GeminiError>(&body)
                .map(|e| format!("{}: {}", e.error.status, e.error.message))
                .unwrap_or_else(|_| format!("HTTP {}", status));
            if status.is_server_error() {
                return Err(Error::ServerError(sanitize_api_error(&detail)));
            }
            return Err(Error::Api(sanitize_api_error(&detail)));
        }

        serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = if request.model.is_empty() {
            self.config.default_model.clone()
        } else {
            request.model.clone()
        };

        let (system_instruction, contents) = Self::convert_messages(&request.messages);
        let gemini_request = GeminiRequest {
            contents,
            system_instruction,
            generation_config: Some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request
                    .max_tokens
                    .or(Some(self.config.default_max_tokens)),
            }),
        };

        let response = self.send_request(&model, &gemini_request).await?;
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("no candidates in response".to_string()))?;

        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = response.usage_metadata.map(|u| {
            let completion_tokens = u.candidates_token_count.unwrap_or(0);
            TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens,
                total_tokens: u.total_token_count,
            }
        });

        Ok(CompletionResponse {
            content,
            usage,
            finish_reason: candidate.finish_reason,
            model,
        })
    }
}
