//! Data models for mnemo.
//!
//! Documents are derived views over the authoritative SQL records (todos and
//! memories). They are regenerated on every (re)index and never written back.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// CONTENT
// =============================================================================

/// Kind of indexed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Todo,
    Memory,
    Web,
}

impl ContentType {
    /// All content types, in tie-break order.
    pub const ALL: [ContentType; 3] = [ContentType::Todo, ContentType::Memory, ContentType::Web];

    /// Content types owned by the user (searched by the memories ask mode).
    pub const PERSONAL: [ContentType; 2] = [ContentType::Todo, ContentType::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Memory => "memory",
            Self::Web => "web",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "todo" | "todos" => Ok(Self::Todo),
            "memory" | "memories" | "note" | "notes" => Ok(Self::Memory),
            "web" => Ok(Self::Web),
            _ => Err(format!("Invalid content type: {}", s)),
        }
    }
}

/// Metadata keys worth embedding alongside title and content.
pub const SALIENT_METADATA_KEYS: [&str; 6] =
    ["status", "priority", "due_date", "category", "tags", "url"];

/// Indexable document: the unit stored in the vector and keyword indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content_id: Uuid,
    pub content_type: ContentType,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a document with empty metadata, created now.
    pub fn new(
        content_type: ContentType,
        content_id: Uuid,
        user_id: Uuid,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            content_id,
            content_type,
            user_id,
            title: title.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Identity used for deduplication and fusion.
    pub fn key(&self) -> DocumentKey {
        DocumentKey {
            content_type: self.content_type,
            content_id: self.content_id,
        }
    }

    /// Text submitted for passage embedding: title, content, then the
    /// salient metadata fields as `key: value` lines.
    pub fn passage_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !self.title.trim().is_empty() {
            parts.push(self.title.trim().to_string());
        }
        if !self.content.trim().is_empty() {
            parts.push(self.content.trim().to_string());
        }
        let meta: Vec<String> = SALIENT_METADATA_KEYS
            .iter()
            .filter_map(|key| {
                self.metadata
                    .get(*key)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| format!("{}: {}", key, v.trim()))
            })
            .collect();
        if !meta.is_empty() {
            parts.push(meta.join("\n"));
        }
        parts.join("\n\n")
    }
}

/// Identity of a document across indices: `(content_type, content_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentKey {
    pub content_type: ContentType,
    pub content_id: Uuid,
}

/// A todo as stored in the SQL source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Todo> for Document {
    fn from(todo: Todo) -> Self {
        let mut doc = Document::new(
            ContentType::Todo,
            todo.id,
            todo.user_id,
            todo.title,
            todo.description,
        )
        .with_created_at(todo.created_at)
        .with_metadata("status", todo.status)
        .with_metadata("priority", todo.priority);
        if let Some(due) = todo.due_date {
            doc = doc.with_metadata("due_date", due.format("%Y-%m-%d").to_string());
        }
        if !todo.tags.is_empty() {
            doc = doc.with_metadata("tags", todo.tags.join(", "));
        }
        doc
    }
}

/// A memory (short note) as stored in the SQL source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Memory> for Document {
    fn from(memory: Memory) -> Self {
        let mut doc = Document::new(
            ContentType::Memory,
            memory.id,
            memory.user_id,
            memory.title,
            memory.content,
        )
        .with_created_at(memory.created_at);
        if let Some(category) = memory.category {
            doc = doc.with_metadata("category", category);
        }
        if !memory.tags.is_empty() {
            doc = doc.with_metadata("tags", memory.tags.join(", "));
        }
        doc
    }
}

/// A token-bounded slice of text prepared for embedding. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
    pub token_count: usize,
    pub char_count: usize,
}

// =============================================================================
// SEARCH
// =============================================================================

/// Which retrieval branch(es) produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Vector,
    Keyword,
    Hybrid,
}

/// A ranked search result.
///
/// `score` is cosine similarity for vector results, a non-negative rank
/// conversion for keyword results, and the fused RRF score after ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
    pub match_type: MatchType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
}

impl SearchResult {
    pub fn vector(document: Document, score: f32) -> Self {
        Self {
            document,
            score,
            match_type: MatchType::Vector,
            highlights: Vec::new(),
        }
    }
}

/// Keyword index hit carrying the index's native rank (lower is better).
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    pub document: Document,
    pub rank: f64,
    pub snippet: String,
}

impl KeywordHit {
    /// Caller-facing score: the native rank negated and clamped at zero.
    pub fn score(&self) -> f32 {
        (-self.rank).max(0.0) as f32
    }

    pub fn into_result(self) -> SearchResult {
        let score = self.score();
        let highlights = if self.snippet.trim().is_empty() {
            Vec::new()
        } else {
            vec![self.snippet]
        };
        SearchResult {
            document: self.document,
            score,
            match_type: MatchType::Keyword,
            highlights,
        }
    }
}

/// A hybrid search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub user_id: Uuid,
    pub query: String,
    pub limit: usize,
    pub vector_weight: f32,
    /// Empty means every content type.
    #[serde(default)]
    pub content_types: Vec<ContentType>,
}

impl SearchRequest {
    pub fn new(user_id: Uuid, query: impl Into<String>) -> Self {
        Self {
            user_id,
            query: query.into(),
            limit: crate::defaults::SEARCH_LIMIT,
            vector_weight: crate::defaults::VECTOR_WEIGHT,
            content_types: Vec::new(),
        }
    }

    /// Set the result limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the vector branch weight (keyword weight is `1 - weight`).
    pub fn with_vector_weight(mut self, weight: f32) -> Self {
        self.vector_weight = weight;
        self
    }

    /// Restrict results to the given content types.
    pub fn with_content_types(mut self, content_types: Vec<ContentType>) -> Self {
        self.content_types = content_types;
        self
    }

    /// Keyword branch weight.
    pub fn keyword_weight(&self) -> f32 {
        1.0 - self.vector_weight
    }
}

/// Ranked, enriched search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_count: usize,
    pub elapsed_ms: u64,
    /// Whether the results were served from the search cache.
    #[serde(default)]
    pub cached: bool,
}

// =============================================================================
// INDEXING
// =============================================================================

/// Embedding model identity every stored vector is tagged with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexVersion {
    pub model: String,
    pub dimension: usize,
}

impl std::fmt::Display for IndexVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.model, self.dimension)
    }
}

/// Vector index statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub documents: usize,
    pub version: Option<IndexVersion>,
}

/// Outcome of a bulk backfill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub elapsed_ms: u64,
}

// =============================================================================
// INFERENCE
// =============================================================================

/// Asymmetric embedding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    /// Content being indexed.
    Passage,
    /// Text being searched for.
    Query,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passage => "passage",
            Self::Query => "query",
        }
    }
}

/// AI vendor API family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// OpenAI-style chat completions (also Ollama, OpenRouter, vLLM).
    OpenAI,
    /// Anthropic messages API.
    Anthropic,
    /// Google generateContent API.
    Google,
}

impl ProviderType {
    /// Default API base URL for this vendor.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAI => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Google => "https://generativelanguage.googleapis.com/v1beta",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::Google => write!(f, "google"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "ollama" | "openrouter" => Ok(Self::OpenAI),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "google" | "gemini" => Ok(Self::Google),
            _ => Err(format!("Invalid provider type: {}", s)),
        }
    }
}

/// Everything needed to call one completion endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider_type", &self.provider_type)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .finish()
    }
}

// =============================================================================
// WEB
// =============================================================================

/// A web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

/// Text extracted from a fetched web page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub title: String,
    pub content: String,
}

// =============================================================================
// ASK
// =============================================================================

/// Answer mode, selected per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AskMode {
    /// Answer from the user's own todos and memories.
    Memories,
    /// Answer from live web search.
    Internet,
    /// Personal context plus LLM-directed web research.
    Hybrid,
    /// Send the question straight to the model.
    Llm,
}

impl std::fmt::Display for AskMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memories => write!(f, "memories"),
            Self::Internet => write!(f, "internet"),
            Self::Hybrid => write!(f, "hybrid"),
            Self::Llm => write!(f, "llm"),
        }
    }
}

impl std::str::FromStr for AskMode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memories" | "memory" => Ok(Self::Memories),
            "internet" | "web" => Ok(Self::Internet),
            "hybrid" => Ok(Self::Hybrid),
            "llm" => Ok(Self::Llm),
            _ => Err(format!("Invalid ask mode: {}", s)),
        }
    }
}

/// A question for the ask pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskRequest {
    pub user_id: Uuid,
    pub question: String,
    pub mode: AskMode,
    pub max_context: usize,
    #[serde(default)]
    pub content_types: Vec<ContentType>,
}

impl AskRequest {
    pub fn new(user_id: Uuid, question: impl Into<String>, mode: AskMode) -> Self {
        Self {
            user_id,
            question: question.into(),
            mode,
            max_context: crate::defaults::ASK_MAX_CONTEXT,
            content_types: Vec::new(),
        }
    }

    pub fn with_max_context(mut self, max_context: usize) -> Self {
        self.max_context = max_context;
        self
    }

    pub fn with_content_types(mut self, content_types: Vec<ContentType>) -> Self {
        self.content_types = content_types;
        self
    }
}

/// Where a piece of answer context came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Source {
    /// Source pointing at one of the user's documents.
    pub fn from_result(result: &SearchResult) -> Self {
        Self {
            title: result.document.title.clone(),
            content_type: result.document.content_type,
            content_id: Some(result.document.content_id),
            url: result.document.metadata.get("url").cloned(),
            score: Some(result.score),
        }
    }

    /// Source pointing at a web page.
    pub fn web(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content_type: ContentType::Web,
            content_id: None,
            url: Some(url.into()),
            score: None,
        }
    }
}

/// The pipeline's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub mode: AskMode,
    pub elapsed_ms: u64,
}
