//! In-process index and store implementations.
//!
//! These back the test suites and embedded use without a database. They
//! implement the same traits as the PostgreSQL adapters in `mnemo-db` with
//! the same semantics: per-user isolation, delete-then-add updates, cosine scores,
//! conjunctive prefix keyword matching with native ranks where lower is
//! better.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use mnemo_core::{
    ContentStore, ContentType, Document, DocumentKey, Embedder, Error, IndexStats, IndexVersion,
    KeywordHit, KeywordIndex, Memory, Result, SearchCache, SearchResult, Todo, VectorIndex,
};

use crate::keyword::prefix_terms;

/// Cosine similarity of two vectors; 0.0 when either is zero or the
/// lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn already_indexed(key: &DocumentKey) -> Error {
    Error::Conflict(format!(
        "{} {} is already indexed",
        key.content_type, key.content_id
    ))
}

fn type_allowed(content_types: &[ContentType], content_type: ContentType) -> bool {
    content_types.is_empty() || content_types.contains(&content_type)
}

// =============================================================================
// VECTOR INDEX
// =============================================================================

struct IndexedDocument {
    document: Document,
    vector: Vec<f32>,
}

/// Brute-force cosine index held in memory.
pub struct MemoryVectorIndex {
    embedder: Arc<dyn Embedder>,
    version: IndexVersion,
    entries: RwLock<HashMap<DocumentKey, IndexedDocument>>,
}

impl MemoryVectorIndex {
    /// Create an empty index tagged with the embedder's version.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        let version = embedder.version();
        Self {
            embedder,
            version,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Open an index whose vectors were produced under `stored`.
    ///
    /// Refuses to mix models: a differing stored version is a
    /// configuration error until the index is rebuilt.
    pub fn open(embedder: Arc<dyn Embedder>, stored: Option<&IndexVersion>) -> Result<Self> {
        let current = embedder.version();
        if let Some(stored) = stored {
            if *stored != current {
                return Err(Error::Config(format!(
                    "vector index was built with {} but embedder is {}; rebuild the index",
                    stored, current
                )));
            }
        }
        Ok(Self::new(embedder))
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    fn version(&self) -> IndexVersion {
        self.version.clone()
    }

    async fn add(&self, document: &Document) -> Result<()> {
        let key = document.key();
        if self.entries.read().await.contains_key(&key) {
            return Err(already_indexed(&key));
        }
        let vector = self.embedder.embed_passage(&document.passage_text()).await?;
        let vector = vector.to_vec();
        if vector.len() != self.version.dimension {
            return Err(Error::Embedding(format!(
                "vector dimension {} does not match index dimension {}",
                vector.len(),
                self.version.dimension
            )));
        }
        match self.entries.write().await.entry(key) {
            Entry::Occupied(entry) => Err(already_indexed(entry.key())),
            Entry::Vacant(entry) => {
                entry.insert(IndexedDocument {
                    document: document.clone(),
                    vector,
                });
                Ok(())
            }
        }
    }

    async fn search_by_user(
        &self,
        user_id: Uuid,
        query: &str,
        k: usize,
        content_types: &[ContentType],
    ) -> Result<Vec<SearchResult>> {
        let query_vector = self.embedder.embed_query(query).await?.to_vec();
        let entries = self.entries.read().await;
        let mut results: Vec<SearchResult> = entries
            .values()
            .filter(|e| e.document.user_id == user_id)
            .filter(|e| type_allowed(content_types, e.document.content_type))
            .map(|e| {
                let score = cosine_similarity(&query_vector, &e.vector).max(0.0);
                SearchResult::vector(e.document.clone(), score)
            })
            .collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.key().cmp(&b.document.key()))
        });
        results.truncate(k);
        Ok(results)
    }

    async fn get_by_content_id(
        &self,
        content_type: ContentType,
        content_id: Uuid,
    ) -> Result<Option<Document>> {
        let key = DocumentKey {
            content_type,
            content_id,
        };
        Ok(self
            .entries
            .read()
            .await
            .get(&key)
            .map(|e| e.document.clone()))
    }

    async fn delete_by_content_id(
        &self,
        content_type: ContentType,
        content_id: Uuid,
    ) -> Result<bool> {
        let key = DocumentKey {
            content_type,
            content_id,
        };
        Ok(self.entries.write().await.remove(&key).is_some())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.document.user_id != user_id);
        Ok((before - entries.len()) as u64)
    }

    async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            documents: self.entries.read().await.len(),
            version: Some(self.version.clone()),
        })
    }
}

// =============================================================================
// CONTENT STORE + KEYWORD INDEX
// =============================================================================

/// Todos and memories held in memory, searchable by keyword.
#[derive(Default)]
pub struct MemoryContentStore {
    todos: RwLock<HashMap<Uuid, Todo>>,
    memories: RwLock<HashMap<Uuid, Memory>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_todo(&self, todo: Todo) {
        self.todos.write().await.insert(todo.id, todo);
    }

    pub async fn upsert_memory(&self, memory: Memory) {
        self.memories.write().await.insert(memory.id, memory);
    }

    pub async fn remove_todo(&self, id: Uuid) -> bool {
        self.todos.write().await.remove(&id).is_some()
    }

    pub async fn remove_memory(&self, id: Uuid) -> bool {
        self.memories.write().await.remove(&id).is_some()
    }

    /// Delete every record of a user. Returns the number removed.
    pub async fn delete_user(&self, user_id: Uuid) -> u64 {
        let mut todos = self.todos.write().await;
        let mut memories = self.memories.write().await;
        let before = todos.len() + memories.len();
        todos.retain(|_, t| t.user_id != user_id);
        memories.retain(|_, m| m.user_id != user_id);
        (before - todos.len() - memories.len()) as u64
    }

    async fn documents_for(&self, user_id: Uuid, content_types: &[ContentType]) -> Vec<Document> {
        let mut docs = Vec::new();
        if type_allowed(content_types, ContentType::Todo) {
            docs.extend(
                self.todos
                    .read()
                    .await
                    .values()
                    .filter(|t| t.user_id == user_id)
                    .cloned()
                    .map(Document::from),
            );
        }
        if type_allowed(content_types, ContentType::Memory) {
            docs.extend(
                self.memories
                    .read()
                    .await
                    .values()
                    .filter(|m| m.user_id == user_id)
                    .cloned()
                    .map(Document::from),
            );
        }
        docs
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get_todo_by_id(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>> {
        Ok(self
            .todos
            .read()
            .await
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn get_memory_by_id(&self, user_id: Uuid, id: Uuid) -> Result<Option<Memory>> {
        Ok(self
            .memories
            .read()
            .await
            .get(&id)
            .filter(|m| m.user_id == user_id)
            .cloned())
    }

    async fn list_todos(&self, user_id: Uuid) -> Result<Vec<Todo>> {
        let mut todos: Vec<Todo> = self
            .todos
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        todos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(todos)
    }

    async fn list_memories(&self, user_id: Uuid) -> Result<Vec<Memory>> {
        let mut memories: Vec<Memory> = self
            .memories
            .read()
            .await
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        memories.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(memories)
    }
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn matches_any(word: &str, terms: &[String]) -> bool {
    let lower = word.to_lowercase();
    terms.iter().any(|t| lower.starts_with(t.as_str()))
}

/// Snippet window around the first matching word, matches in `<b>` tags.
fn snippet(text: &str, terms: &[String]) -> String {
    const BEFORE: usize = 5;
    const WIDTH: usize = 20;

    let tokens: Vec<&str> = text.split_whitespace().collect();
    let first = tokens
        .iter()
        .position(|t| words(t).iter().any(|w| matches_any(w, terms)))
        .unwrap_or(0);
    let start = first.saturating_sub(BEFORE);
    tokens
        .iter()
        .skip(start)
        .take(WIDTH)
        .map(|t| {
            if words(t).iter().any(|w| matches_any(w, terms)) {
                format!("<b>{}</b>", t)
            } else {
                t.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl KeywordIndex for MemoryContentStore {
    async fn search(
        &self,
        user_id: Uuid,
        query: &str,
        content_types: &[ContentType],
        limit: usize,
    ) -> Result<Vec<KeywordHit>> {
        let terms = prefix_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<KeywordHit> = Vec::new();
        for document in self.documents_for(user_id, content_types).await {
            let text = document.passage_text();
            let lowered: Vec<String> = words(&text).iter().map(|w| w.to_lowercase()).collect();

            let mut total = 0usize;
            let mut all_matched = true;
            for term in &terms {
                let count = lowered.iter().filter(|w| w.starts_with(term.as_str())).count();
                if count == 0 {
                    all_matched = false;
                    break;
                }
                total += count;
            }
            if !all_matched {
                continue;
            }

            let rank = -(total as f64) / (lowered.len().max(1) as f64).sqrt();
            let snippet = snippet(&text, &terms);
            hits.push(KeywordHit {
                document,
                rank,
                snippet,
            });
        }

        hits.sort_by(|a, b| {
            a.rank
                .partial_cmp(&b.rank)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.key().cmp(&b.document.key()))
        });
        hits.truncate(limit);

        debug!(
            subsystem = "search",
            component = "memory_keyword",
            terms = terms.len(),
            result_count = hits.len(),
            "Keyword search complete"
        );
        Ok(hits)
    }
}

// =============================================================================
// SEARCH CACHE
// =============================================================================

/// Process-local search cache with per-entry expiry.
#[derive(Default)]
pub struct MemorySearchCache {
    entries: RwLock<HashMap<String, (JsonValue, Instant)>>,
}

impl MemorySearchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SearchCache for MemorySearchCache {
    async fn get_json(&self, key: &str) -> Result<Option<JsonValue>> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .filter(|(_, expires)| *expires > now)
            .map(|(value, _)| value.clone()))
    }

    async fn set_json(&self, key: &str, value: &JsonValue, ttl: Duration) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn invalidate_user(&self, user_id: Uuid) -> Result<u64> {
        let marker = format!("{}:", user_id);
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.contains(&marker));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn memory(user_id: Uuid, title: &str, content: &str) -> Memory {
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

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_snippet_marks_matches() {
        let terms = vec!["pass".to_string()];
        assert_eq!(
            snippet("Renew my passport soon", &terms),
            "Renew my <b>passport</b> soon"
        );
    }

    #[tokio::test]
    async fn test_keyword_search_is_conjunctive_and_user_scoped() {
        let store = MemoryContentStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store
            .upsert_memory(memory(alice, "Passport", "Renew passport at consulate"))
            .await;
        store
            .upsert_memory(memory(alice, "Groceries", "Buy milk and eggs"))
            .await;
        store
            .upsert_memory(memory(bob, "Passport", "Bob's passport renewal"))
            .await;

        let hits = store.search(alice, "renew* pass*", &[], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.title, "Passport");
        assert!(hits[0].rank < 0.0);
        assert!(hits[0].snippet.contains("<b>"));

        let none = store.search(alice, "renew* milk*", &[], 10).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_keyword_empty_query_matches_nothing() {
        let store = MemoryContentStore::new();
        let alice = Uuid::new_v4();
        store.upsert_memory(memory(alice, "Note", "anything")).await;
        assert!(store
            .search(alice, crate::keyword::EMPTY_QUERY, &[], 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_content_type_filter() {
        let store = MemoryContentStore::new();
        let alice = Uuid::new_v4();
        store
            .upsert_memory(memory(alice, "Dentist", "Dentist on Friday"))
            .await;
        let hits = store
            .search(alice, "dentist*", &[ContentType::Todo], 10)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_store_scopes_reads_by_user() {
        let store = MemoryContentStore::new();
        let alice = Uuid::new_v4();
        let m = memory(alice, "Private", "secret note");
        let id = m.id;
        store.upsert_memory(m).await;
        assert!(store.get_memory_by_id(alice, id).await.unwrap().is_some());
        assert!(store
            .get_memory_by_id(Uuid::new_v4(), id)
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.delete_user(alice).await, 1);
        assert!(store.list_memories(alice).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_entries_expire() {
        let cache = MemorySearchCache::new();
        let value = serde_json::json!({"results": []});
        cache
            .set_json("k", &value, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(cache.get_json("k").await.unwrap(), Some(value));
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get_json("k").await.unwrap(), None);
    }
}
