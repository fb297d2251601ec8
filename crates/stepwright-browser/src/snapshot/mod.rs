//! Page state extraction
//!
//! [`capture`] reads a live page into a [`PageSnapshot`] with one page
//! function. Extraction never fails outward: problems produce
//! [`PageState::Degraded`]. [`PageSnapshot::summary`] renders a bounded text
//! form for model prompts.

mod extract;
mod summary;
mod types;

pub use extract::capture;
pub use types::{ElementInfo, FormInfo, InputInfo, LinkInfo, NavBlock, PageSnapshot, PageState, Rect};
