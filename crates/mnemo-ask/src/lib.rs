//! # mnemo-ask
//!
//! Question answering over a user's todos and memories, the live web, or
//! both. Context is retrieved per mode, placed into a mode-specific prompt
//! and sent to the user's configured AI provider.

pub mod context;
pub mod pipeline;
pub mod prompts;
pub mod web;

pub use context::{merge_sources, personal_context, web_context, WebPage};
pub use pipeline::{AskConfig, AskPipeline};
pub use prompts::parse_search_queries;
pub use web::{extract_page, HttpScraper, SearxngConfig, SearxngSearch};
