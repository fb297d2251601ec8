//! Canonical action scripts
//!
//! Synthesized code is parsed into a closed instruction set before anything
//! touches the page. Only [`Statement::Evaluate`] can run caller-supplied
//! script text, and it does so unsandboxed.

mod ast;
mod parser;
mod runner;

pub use ast::{Act, ActionScript, Locator, LocatorIndex, LocatorKind, Statement, WaitCondition};
pub use parser::{parse, ParseError};
pub use runner::{resolve_url, ScriptRunner};
