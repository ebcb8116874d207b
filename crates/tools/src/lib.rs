//! Deterministic helpers for FinQA turns.
//!
//! Nothing in this crate talks to a model. It evaluates agent-generated
//! expressions inside a closed grammar, formats the results for display,
//! and renders dataset tables as Markdown.

pub mod calculator;
pub mod format;
pub mod table;

pub use calculator::{SAFE_FUNCTIONS, Variables, evaluate};
pub use format::format_response;
pub use table::render as render_table;
