//! Stepwright Core - the retry-and-repair execution engine
//!
//! This crate provides:
//! - Model: steps, jobs, statuses and attempt records
//! - Analyzer: failure classification and element hints
//! - Synthesizer: natural language to action script via an [`LlmProvider`]
//! - Executor: the bounded retry loop over one step
//! - Runner: sequential job execution with status updates and screenshots
//! - Status: status sinks (log, Postgres)
//! - Artifacts: screenshot files
//!
//! [`LlmProvider`]: stepwright_llm::LlmProvider

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod analyzer;
pub mod artifacts;
pub mod error;
pub mod executor;
pub mod model;
pub mod runner;
pub mod status;
pub mod synthesizer;

pub use analyzer::{analyze, ElementHint, ErrorAnalysis, Finding};
pub use artifacts::ArtifactStore;
pub use error::{Error, Result};
pub use executor::{RetryExecutor, RetryPolicy, StepOutcome};
pub use model::{AttemptOutcome, ExecutionAttempt, Job, Step, StepId, StepStatus};
pub use runner::{ExecutionSummary, JobReport, JobRunner, StepReport, SummaryEntry};
pub use status::{LogStatusSink, PostgresSinkConfig, PostgresStatusSink, StatusSink, StatusUpdate};
pub use synthesizer::{Synthesis, SynthesisRequest, Synthesizer, SynthesizerConfig};
