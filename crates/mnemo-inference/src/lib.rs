//! # mnemo-inference
//!
//! Embedding and completion backends for mnemo.
//!
//! This crate provides:
//! - [`EmbeddingClient`]: sanitize, chunk, rate-limit, and pool passages
//! - [`RateLimiter`]: minimum-interval limiter shared through `Arc`
//! - OpenAI-compatible embedding backend with NVIDIA NIM `input_type`
//! - Completion adapters for OpenAI-style chat, Anthropic messages, and
//!   Google generateContent behind [`ProviderClient`]
//! - [`ProviderResolver`]: user default, then environment, then error
//!
//! # Feature Flags
//!
//! - `mock`: deterministic mock backends for tests in dependent crates
//!
//! # Example
//!
//! ```rust,no_run
//! use mnemo_inference::EmbeddingClient;
//! use mnemo_core::Embedder;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = EmbeddingClient::from_env().unwrap();
//!     let vector = client.embed_query("when is the dentist?").await.unwrap();
//! }
//! ```

pub mod anthropic;
pub mod embedding;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod provider;
pub mod rate_limit;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use embedding::{l2_normalize, mean_pool, EmbeddingClient};
pub use error::{to_mnemo_error, Operation, ProviderErrorCode};
pub use openai::{OpenAIBackend, OpenAIConfig};
pub use provider::{default_model, provider_config_from_env, ProviderClient, ProviderResolver};
pub use rate_limit::RateLimiter;
