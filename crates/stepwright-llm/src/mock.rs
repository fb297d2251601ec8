//! Mock LLM Provider for testing
//!
//! Returns queued responses in order and records every request it receives.

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::{Error, Result};
use crate::provider::LlmProvider;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const MOCK_MODEL: &str = "mock-model";

/// A mock LLM provider that returns queued responses or a default one.
#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Result<String>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider pre-loaded with successful responses.
    #[must_use]
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        for r in responses {
            mock.push_response(r);
        }
        mock
    }

    /// Queue a successful completion.
    pub fn push_response(&self, content: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(content.into()));
    }

    /// Queue a failed completion.
    pub fn push_error(&self, error: Error) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of `complete` calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        MOCK_MODEL
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let next = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        let content = match next {
            Some(result) => result?,
            // Default behavior if queue empty
            None => "mock response".to_string(),
        };

        Ok(CompletionResponse {
            content,
            usage: None,
            finish_reason: Some("stop".to_string()),
            model: MOCK_MODEL.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn test_mock_returns_queued_in_order() {
        let mock = MockProvider::with_responses(["first", "second"]);
        mock.push_error(Error::RateLimit);

        let req = CompletionRequest::new("").with_message(Message::user("go"));
        assert_eq!(mock.complete(req.clone()).await.unwrap().content, "first");
        assert_eq!(mock.complete(req.clone()).await.unwrap().content, "second");
        assert!(matches!(
            mock.complete(req.clone()).await,
            Err(Error::RateLimit)
        ));
        assert_eq!(mock.complete(req).await.unwrap().content, "mock response");
        assert_eq!(mock.call_count(), 4);
    }

    #[tokio::test]
    async fn test_mock_records_requests() {
        let mock = MockProvider::new();
        let shared = mock.clone();
        let req = CompletionRequest::new("m").with_message(Message::user("hello"));
        mock.complete(req).await.unwrap();

        let seen = shared.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].messages[0].content, "hello");
    }
}
