//! OpenAI-compatible backends.
//!
//! Embeddings go through [`OpenAIBackend`], which speaks the `/embeddings`
//! protocol with the `input_type` extension used by NVIDIA NIM asymmetric
//! models. Chat completions go through [`chat_completion`] and work with
//! any OpenAI-compatible endpoint:
//!
//! - OpenAI cloud API
//! - Ollama (in OpenAI compatibility mode)
//! - OpenRouter
//! - vLLM
//!
//! # Example
//!
//! ```rust,no_run
//! use mnemo_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use mnemo_core::{EmbeddingBackend, InputType};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAIBackend::new(OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(),
//!         embed_model: "nomic-embed-text".to_string(),
//!         embed_dimension: 768,
//!         send_input_type: false,
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//!     let texts = vec!["Hello, world!".to_string()];
//!     let vectors = backend.embed_texts(&texts, InputType::Passage).await.unwrap();
//! }
//! ```

mod backend;
mod chat;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use chat::chat_completion;
pub use types::*;
