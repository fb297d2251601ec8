//! Stepwright LLM - provider abstraction for instruction synthesis
//!
//! This crate provides:
//! - The [`LlmProvider`] trait every completion backend implements
//! - A Gemini provider speaking the `generateContent` REST API
//! - A scripted [`MockProvider`] for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod error;
pub mod gemini;
pub mod message;
pub mod mock;
pub mod provider;
pub mod util;

pub use completion::{CompletionRequest, CompletionResponse, TokenUsage};
pub use error::{Error, Result};
pub use gemini::{GeminiConfig, GeminiProvider};
pub use message::{Message, MessageRole};
pub use mock::MockProvider;
pub use provider::LlmProvider;
