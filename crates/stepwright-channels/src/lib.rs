//! Stepwright Channels - job intake
//!
//! This crate provides:
//! - Job message parsing (structured `testSteps` and legacy `prompts`)
//! - The [`JobSource`] trait and the intake pump feeding the execution loop
//! - A NATS queue-group subscriber
//! - A JSON file source for one-shot runs

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod file;
pub mod message;
pub mod nats;
pub mod source;

pub use error::{Error, Result};
pub use file::FileJobSource;
pub use message::{parse_job, JobMessage, TestStepPayload};
pub use nats::{NatsConfig, NatsJobSource};
pub use source::{run_intake, JobSource};
