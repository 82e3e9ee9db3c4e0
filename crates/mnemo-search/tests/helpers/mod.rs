//! Test helpers for search and indexing tests.
//!
//! Builds an in-memory stack (store, vector index, mock embedder) and
//! fixture records.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use mnemo_core::{Document, Embedder, Memory, Todo, VectorIndex};
use mnemo_inference::mock::MockEmbeddingBackend;
use mnemo_inference::{EmbeddingClient, RateLimiter};
use mnemo_search::{HybridSearchEngine, Indexer, MemoryContentStore, MemoryVectorIndex};
use uuid::Uuid;

/// In-memory search stack.
pub struct Stack {
    pub store: Arc<MemoryContentStore>,
    pub index: Arc<MemoryVectorIndex>,
    pub embedder: Arc<EmbeddingClient>,
    pub backend: MockEmbeddingBackend,
}

impl Stack {
    pub fn new() -> Self {
        Self::with_backend(MockEmbeddingBackend::new())
    }

    pub fn with_backend(backend: MockEmbeddingBackend) -> Self {
        let embedder = Arc::new(EmbeddingClient::new(
            Arc::new(backend.clone()),
            Arc::new(RateLimiter::unlimited()),
        ));
        let index = Arc::new(MemoryVectorIndex::new(embedder.clone()));
        Self {
            store: Arc::new(MemoryContentStore::new()),
            index,
            embedder,
            backend,
        }
    }

    pub fn engine(&self) -> HybridSearchEngine {
        HybridSearchEngine::new(self.index.clone(), self.store.clone(), self.store.clone())
    }

    pub fn indexer(&self) -> Indexer {
        Indexer::new(self.index.clone(), self.store.clone())
    }

    /// Store a memory and index it.
    pub async fn add_memory(&self, user_id: Uuid, title: &str, content: &str) -> Memory {
        let m = memory(user_id, title, content);
        self.store.upsert_memory(m.clone()).await;
        self.index
            .add(&Document::from(m.clone()))
            .await
            .expect("index memory");
        m
    }

    /// Store a todo and index it.
    pub async fn add_todo(&self, user_id: Uuid, title: &str, description: &str) -> Todo {
        let t = todo(user_id, title, description);
        self.store.upsert_todo(t.clone()).await;
        self.index
            .add(&Document::from(t.clone()))
            .await
            .expect("index todo");
        t
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }
}

pub fn memory(user_id: Uuid, title: &str, content: &str) -> Memory {
    Memory {
        id: Uuid::new_v4(),
        user_id,
        title: title.to_string(),
        content: content.to_string(),
        category: None,
        tags: Vec::new(),
        created_at: Utc::now(),
    }
}

pub fn todo(user_id: Uuid, title: &str, description: &str) -> Todo {
    Todo {
        id: Uuid::new_v4(),
        user_id,
        title: title.to_string(),
        description: description.to_string(),
        status: "pending".to_string(),
        priority: "medium".to_string(),
        due_date: None,
        tags: Vec::new(),
        created_at: Utc::now(),
    }
}
