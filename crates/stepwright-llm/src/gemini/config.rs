//! Gemini provider configuration

use crate::error::{Error, Result};
use crate::util::mask_api_key;
use std::fmt;
use std::time::Duration;

/// Default API base URL
pub(crate) const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Gemini model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Gemini provider configuration
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key (appended as `?key=` in URL)
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Default max tokens
    pub default_max_tokens: u32,
    /// Request timeout
    pub timeout: Duration,
}

// SECURITY: Custom Debug implementation to mask credentials
impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiConfig {
    /// Create a new configuration with an API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            default_max_tokens: 8192,
            timeout: Duration::from_secs(60),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Reads `GEMINI_API_KEY` (falling back to `GOOGLE_API_KEY`), plus the
    /// optional `GEMINI_MODEL` and `GEMINI_BASE_URL` overrides.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::NotConfigured("GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string())
            })?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            if !model.is_empty() {
                config.default_model = model;
            }
        }
        if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
            if !url.is_empty() {
                config.base_url = url;
            }
        }
        Ok(config)
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the default model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the default max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
