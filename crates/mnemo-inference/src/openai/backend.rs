//! OpenAI-compatible embedding backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use mnemo_core::{defaults, EmbeddingBackend, Error, InputType, Result, Vector};

use super::types::*;
use crate::error::{error_from_response, Operation};

/// Configuration for the OpenAI-compatible embedding backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for embeddings.
    pub embed_model: String,
    /// Expected embedding dimension.
    pub embed_dimension: usize,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Send the `input_type` field (NVIDIA NIM asymmetric models).
    pub send_input_type: bool,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::EMBED_BASE_URL.to_string(),
            api_key: None,
            embed_model: defaults::EMBED_MODEL.to_string(),
            embed_dimension: defaults::EMBED_DIMENSION,
            timeout_seconds: defaults::EMBED_TIMEOUT_SECS,
            send_input_type: true,
        }
    }
}

impl OpenAIConfig {
    /// Read configuration from the environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `EMBED_BASE_URL` | NVIDIA NIM endpoint |
    /// | `EMBED_API_KEY` | none |
    /// | `EMBED_MODEL` | `nvidia/nv-embedqa-e5-v5` |
    /// | `EMBED_DIMENSION` | 1024 |
    /// | `EMBED_TIMEOUT` | 30 |
    /// | `EMBED_INPUT_TYPE` | `true` |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("EMBED_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("EMBED_API_KEY").ok().filter(|k| !k.is_empty()),
            embed_model: std::env::var("EMBED_MODEL").unwrap_or(defaults.embed_model),
            embed_dimension: std::env::var("EMBED_DIMENSION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.embed_dimension),
            timeout_seconds: std::env::var("EMBED_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_seconds),
            send_input_type: std::env::var("EMBED_INPUT_TYPE")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(defaults.send_input_type),
        }
    }
}

/// OpenAI-compatible embedding backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "openai",
            base_url = %config.base_url,
            model = %config.embed_model,
            dimension = config.embed_dimension,
            "Initializing embedding backend"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    async fn embed_texts(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(
            subsystem = "inference",
            component = "openai",
            op = "embed",
            count = texts.len(),
            input_type = input_type.as_str(),
            model = %self.config.embed_model,
            "Embedding texts"
        );

        let request = EmbeddingRequest {
            model: self.config.embed_model.clone(),
            input: texts.to_vec(),
            input_type: self
                .config
                .send_input_type
                .then(|| input_type.as_str().to_string()),
            encoding_format: Some("float".to_string()),
            truncate: self.config.send_input_type.then(|| "END".to_string()),
        };

        let response = self
            .build_request("/embeddings")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(
                error_from_response("embedding endpoint", response, Operation::Embedding, extract_error)
                    .await,
            );
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        if result.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        // Sort by index to ensure correct ordering
        let mut data = result.data;
        data.sort_by_key(|d| d.index);

        let mut vectors = Vec::with_capacity(data.len());
        for d in data {
            if d.embedding.len() != self.config.embed_dimension {
                return Err(Error::Embedding(format!(
                    "Model returned dimension {}, expected {}",
                    d.embedding.len(),
                    self.config.embed_dimension
                )));
            }
            vectors.push(Vector::from(d.embedding));
        }

        debug!(count = vectors.len(), "Generated embeddings");
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}
