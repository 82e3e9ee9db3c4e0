//! Mock backends for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mnemo_inference::mock::{MockEmbeddingBackend, MockProvider};
//!
//! let backend = MockEmbeddingBackend::new().with_dimension(64);
//! let provider = MockProvider::new().with_response("summary", "Short answer");
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mnemo_core::{
    AiProvider, EmbeddingBackend, Error, InputType, ProviderConfig, Result, Vector,
};

use crate::embedding::l2_normalize;

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

/// Deterministic bag-of-words embedding backend.
///
/// Each lowercase word hashes to one dimension, so texts sharing words have
/// high cosine similarity and disjoint texts are orthogonal.
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    dimension: usize,
    model: String,
    fail: bool,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockEmbeddingBackend {
    pub fn new() -> Self {
        Self {
            dimension: 256,
            model: "mock-embed".to_string(),
            fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Make every request fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Embed one text without recording a call.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let idx = fnv1a(&word.to_lowercase()) as usize % self.dimension;
            v[idx] += 1.0;
        }
        l2_normalize(&mut v);
        v
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of backend requests made.
    pub fn request_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325u64, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vector>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall {
                operation: format!("embed:{}", input_type.as_str()),
                input: texts.join("\n---\n"),
            });
        }
        if self.fail {
            return Err(Error::Embedding("mock embedding failure".to_string()));
        }
        Ok(texts
            .iter()
            .map(|t| Vector::from(self.vector_for(t)))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Scripted completion provider.
///
/// Responses are chosen by the first registered key contained in the
/// prompt, falling back to the default response.
#[derive(Clone)]
pub struct MockProvider {
    responses: Vec<(String, String)>,
    default_response: String,
    fail: bool,
    calls: Arc<Mutex<Vec<MockCall>>>,
    models: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            default_response: "Mock response".to_string(),
            fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
            models: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Reply with `response` when the prompt contains `needle`.
    pub fn with_response(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses.push((needle.into(), response.into()));
        self
    }

    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Make every completion fail with a provider error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Prompts received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.iter().map(|call| call.input.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of completions served per model name.
    pub fn model_counts(&self) -> HashMap<String, usize> {
        self.models.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiProvider for MockProvider {
    async fn complete(&self, config: &ProviderConfig, prompt: &str) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall {
                operation: "complete".to_string(),
                input: prompt.to_string(),
            });
        }
        if let Ok(mut models) = self.models.lock() {
            *models.entry(config.model.clone()).or_default() += 1;
        }
        if self.fail {
            return Err(Error::Provider("mock provider failure".to_string()));
        }
        Ok(self
            .responses
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default_response.clone()))
    }
}
