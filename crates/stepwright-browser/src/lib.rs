//! Stepwright Browser - the browser capability
//!
//! This crate provides:
//! - An MCP (Model Context Protocol) client for the Playwright MCP server
//! - The [`Page`] trait and its MCP-backed implementation [`McpPage`]
//! - [`BrowserSession`], the single owned browser resource
//! - The canonical action-script AST, parser and runner ([`script`])
//! - The code normalizer ([`normalize`])
//! - Page state extraction and prompt summaries ([`snapshot`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
mod js;
pub mod mcp;
pub mod mcp_page;
pub mod normalize;
pub mod page;
pub mod script;
pub mod session;
pub mod snapshot;

pub use config::BrowserConfig;
pub use error::{Error, Result};
pub use mcp_page::McpPage;
pub use normalize::normalize;
pub use page::{LoadState, Page};
pub use script::{
    parse, Act, ActionScript, Locator, LocatorIndex, LocatorKind, ParseError, ScriptRunner,
    Statement, WaitCondition,
};
pub use session::BrowserSession;
pub use snapshot::{capture, PageSnapshot, PageState};
