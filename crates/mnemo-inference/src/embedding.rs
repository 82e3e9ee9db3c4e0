//! Rate-limited, chunk-aware embedding client.
//!
//! [`EmbeddingClient`] is the [`Embedder`] the indices use. It sanitizes the
//! input, rejects near-empty text, chunks passages to the model's token
//! limit, waits on the shared [`RateLimiter`], and pools multi-chunk
//! passages into one unit vector.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, instrument};

use mnemo_core::{
    defaults, sanitize_text, truncate_for_embedding, Embedder, EmbeddingBackend, Error,
    IndexVersion, InputType, Result, TextChunker, Vector,
};

use crate::openai::OpenAIBackend;
use crate::rate_limit::RateLimiter;

/// Embedding client wrapping a backend with the text pipeline and a limiter.
#[derive(Clone)]
pub struct EmbeddingClient {
    backend: Arc<dyn EmbeddingBackend>,
    limiter: Arc<RateLimiter>,
    chunker: TextChunker,
    max_chars: usize,
    timeout: Duration,
}

impl EmbeddingClient {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            backend,
            limiter,
            chunker: TextChunker::default(),
            max_chars: defaults::EMBED_MAX_CHARS,
            timeout: Duration::from_secs(defaults::EMBED_TIMEOUT_SECS),
        }
    }

    /// Replace the chunker.
    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Set the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the HTTP backend and limiter from the environment.
    ///
    /// Reads the `EMBED_*` variables of [`crate::openai::OpenAIConfig`] plus
    /// `EMBED_RPM` (requests per minute, default 40).
    pub fn from_env() -> Result<Self> {
        let backend = OpenAIBackend::from_env()?;
        let rpm = std::env::var("EMBED_RPM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults::EMBED_REQUESTS_PER_MINUTE);
        let timeout = Duration::from_secs(backend.config().timeout_seconds);
        Ok(Self::new(Arc::new(backend), Arc::new(RateLimiter::per_minute(rpm))).with_timeout(timeout))
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Sanitize and validate input text.
    fn prepare(&self, text: &str) -> Result<String> {
        let clean = sanitize_text(text);
        let len = clean.chars().count();
        if len < defaults::EMBED_MIN_TEXT_CHARS {
            return Err(Error::InvalidInput(format!(
                "text too short to embed ({} chars, minimum {})",
                len,
                defaults::EMBED_MIN_TEXT_CHARS
            )));
        }
        Ok(clean)
    }

    /// One rate-limited backend request under the deadline.
    async fn request(&self, texts: Vec<String>, input_type: InputType) -> Result<Vec<Vector>> {
        self.limiter.acquire().await;
        let start = Instant::now();
        let vectors = tokio::time::timeout(self.timeout, self.backend.embed_texts(&texts, input_type))
            .await
            .map_err(|_| {
                Error::Embedding(format!(
                    "embedding request timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;
        debug!(
            subsystem = "inference",
            component = "embedding",
            count = texts.len(),
            input_type = input_type.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Embedding request complete"
        );
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    #[instrument(
        skip(self, text),
        fields(subsystem = "inference", component = "embedding", op = "embed_passage", text_len = text.len())
    )]
    async fn embed_passage(&self, text: &str) -> Result<Vector> {
        let clean = self.prepare(text)?;
        let texts: Vec<String> = self
            .chunker
            .chunk(&clean)
            .into_iter()
            .map(|c| truncate_for_embedding(&c.text, self.max_chars))
            .collect();
        if texts.is_empty() {
            return Err(Error::InvalidInput("nothing to embed".to_string()));
        }
        let chunk_count = texts.len();
        let mut vectors = self.request(texts, InputType::Passage).await?;
        if chunk_count == 1 {
            return vectors
                .pop()
                .ok_or_else(|| Error::Embedding("backend returned no vectors".to_string()));
        }
        debug!(chunk_count, "Pooling chunk vectors");
        mean_pool(&vectors)
            .map(Vector::from)
            .ok_or_else(|| Error::Embedding("cannot pool chunk vectors".to_string()))
    }

    #[instrument(
        skip(self, text),
        fields(subsystem = "inference", component = "embedding", op = "embed_query", text_len = text.len())
    )]
    async fn embed_query(&self, text: &str) -> Result<Vector> {
        let clean = self.prepare(text)?;
        let mut vectors = self
            .request(vec![truncate_for_embedding(&clean, self.max_chars)], InputType::Query)
            .await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Embedding("backend returned no vectors".to_string()))
    }

    fn version(&self) -> IndexVersion {
        IndexVersion {
            model: self.backend.model_name().to_string(),
            dimension: self.backend.dimension(),
        }
    }
}

/// Mean of equally sized vectors, L2-normalized.
///
/// Returns `None` for an empty slice or mismatched dimensions.
pub fn mean_pool(vectors: &[Vector]) -> Option<Vec<f32>> {
    let first = vectors.first()?.as_slice();
    let dim = first.len();
    let mut sum = vec![0.0f32; dim];
    for v in vectors {
        let slice = v.as_slice();
        if slice.len() != dim {
            return None;
        }
        for (acc, x) in sum.iter_mut().zip(slice) {
            *acc += x;
        }
    }
    let n = vectors.len() as f32;
    sum.iter_mut().for_each(|x| *x /= n);
    l2_normalize(&mut sum);
    Some(sum)
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}
