//! Server module for Stepwright
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `providers`: LLM provider resolution
//! - `pipeline`: Synthesizer, executor, sink and artifact assembly
//! - `serve`: NATS intake and the execution loop

pub mod config;
mod loader;
mod pipeline;
mod providers;
mod serve;

pub use loader::load_config;
pub use pipeline::Pipeline;
pub use serve::run;
pub(crate) use serve::spawn_signal_handler;
