//! Completion request and response types

use crate::message::Message;
use serde::{Deserialize, Serialize};

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// Completion request
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Model to use (provider-specific, empty selects the provider default)
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Create a new completion request
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Add a message
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,
    /// Token usage
    pub usage: Option<TokenUsage>,
    /// Finish reason
    pub finish_reason: Option<String>,
    /// Model used
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("gemini-2.5-flash")
            .with_message(Message::system("rules"))
            .with_message(Message::user("task"))
            .with_temperature(0.2)
            .with_max_tokens(2048);

        assert_eq!(request.model, "gemini-2.5-flash");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(2048));
    }
}
