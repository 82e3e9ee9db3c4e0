//! # mnemo-core
//!
//! Core types, traits, and abstractions for the mnemo retrieval engine.
//!
//! This crate provides the foundational data structures (documents, search
//! results, ask requests), the collaborator traits every other crate plugs
//! into, and the text pipeline that prepares content for embedding:
//! sanitization, heuristic token counting, and token-bounded chunking.

pub mod chunking;
pub mod defaults;
pub mod error;
pub mod models;
pub mod text;
pub mod tokenizer;
pub mod traits;

// Re-export commonly used types at crate root
pub use chunking::{chunk_text, truncate_for_embedding, ChunkerConfig, TextChunker};
pub use error::{Error, Result};
pub use models::*;
pub use text::sanitize_text;
pub use tokenizer::*;
pub use traits::*;

/// Embedding vector type shared with the pgvector adapters.
pub use pgvector::Vector;
