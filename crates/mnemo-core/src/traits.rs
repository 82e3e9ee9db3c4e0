//! Core traits for mnemo abstractions.
//!
//! These traits define the collaborator interfaces the retrieval engine
//! consumes. Concrete implementations live in `mnemo-db` (PostgreSQL),
//! `mnemo-search::memory` (in-process), `mnemo-inference` (HTTP backends)
//! and `mnemo-ask::web`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts in the given mode.
    ///
    /// Returns one vector per input text, in input order.
    async fn embed_texts(&self, texts: &[String], input_type: InputType)
        -> Result<Vec<crate::Vector>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Document-level embedder: sanitizes, chunks, rate-limits and pools.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed indexable text as a single passage vector.
    async fn embed_passage(&self, text: &str) -> Result<crate::Vector>;

    /// Embed a search query.
    async fn embed_query(&self, text: &str) -> Result<crate::Vector>;

    /// Model identity every produced vector belongs to.
    fn version(&self) -> IndexVersion;
}

/// Uniform completion call across vendor APIs.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Send a prompt to the configured model and return its text.
    async fn complete(&self, config: &ProviderConfig, prompt: &str) -> Result<String>;
}

/// Per-user AI provider preferences.
#[async_trait]
pub trait ProviderSettings: Send + Sync {
    /// The user's configured default provider, if any.
    async fn default_provider(&self, user_id: Uuid) -> Result<Option<ProviderConfig>>;
}

// =============================================================================
// INDEX TRAITS
// =============================================================================

/// Per-user nearest-neighbour store keyed by content identity.
///
/// Implementations embed documents themselves and are tagged with the
/// [`IndexVersion`] of their embedder. Updates are delete-then-add.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The `(model, dimension)` this index holds vectors for.
    fn version(&self) -> IndexVersion;

    /// Embed the document's passage text and store it.
    ///
    /// A document already present is refused with `Error::Conflict`;
    /// callers replacing a copy delete it first.
    async fn add(&self, document: &Document) -> Result<()>;

    /// Top-k nearest neighbours for one user, scored by cosine similarity.
    ///
    /// An empty `content_types` slice means every type.
    async fn search_by_user(
        &self,
        user_id: Uuid,
        query: &str,
        k: usize,
        content_types: &[ContentType],
    ) -> Result<Vec<SearchResult>>;

    /// Fetch the indexed copy of a document.
    async fn get_by_content_id(
        &self,
        content_type: ContentType,
        content_id: Uuid,
    ) -> Result<Option<Document>>;

    /// Remove a document. Returns whether anything was removed.
    async fn delete_by_content_id(&self, content_type: ContentType, content_id: Uuid)
        -> Result<bool>;

    /// Remove every document of a user. Returns the number removed.
    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64>;

    /// Document count and version tag.
    async fn stats(&self) -> Result<IndexStats>;
}

/// Full-text search with ranked snippets.
#[async_trait]
pub trait KeywordIndex: Send + Sync {
    /// Hits ordered best first. `rank` is native (lower is better).
    async fn search(
        &self,
        user_id: Uuid,
        query: &str,
        content_types: &[ContentType],
        limit: usize,
    ) -> Result<Vec<KeywordHit>>;
}

// =============================================================================
// STORE TRAITS
// =============================================================================

/// Read access to the authoritative SQL records.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_todo_by_id(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>>;

    async fn get_memory_by_id(&self, user_id: Uuid, id: Uuid) -> Result<Option<Memory>>;

    async fn list_todos(&self, user_id: Uuid) -> Result<Vec<Todo>>;

    async fn list_memories(&self, user_id: Uuid) -> Result<Vec<Memory>>;

    /// Load the current document view of a record.
    ///
    /// Web documents are not held by the store and always resolve to `None`.
    async fn get_document(
        &self,
        user_id: Uuid,
        content_type: ContentType,
        content_id: Uuid,
    ) -> Result<Option<Document>> {
        match content_type {
            ContentType::Todo => Ok(self
                .get_todo_by_id(user_id, content_id)
                .await?
                .map(Document::from)),
            ContentType::Memory => Ok(self
                .get_memory_by_id(user_id, content_id)
                .await?
                .map(Document::from)),
            ContentType::Web => Ok(None),
        }
    }
}

/// Cache for serialized search responses.
#[async_trait]
pub trait SearchCache: Send + Sync {
    async fn get_json(&self, key: &str) -> Result<Option<JsonValue>>;

    async fn set_json(&self, key: &str, value: &JsonValue, ttl: Duration) -> Result<()>;

    /// Drop every cached response for a user. Returns the number removed.
    async fn invalidate_user(&self, _user_id: Uuid) -> Result<u64> {
        Ok(0)
    }
}

// =============================================================================
// WEB TRAITS
// =============================================================================

/// Live web search.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebResult>>;
}

/// Fetch a page and extract its readable text.
#[async_trait]
pub trait WebScrape: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ScrapedPage>;
}
