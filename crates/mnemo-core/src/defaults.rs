//! Centralized default constants for mnemo.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// CHUNKING
// =============================================================================

/// Maximum estimated tokens per chunk.
pub const CHUNK_MAX_TOKENS: usize = 450;

/// Overlap tail carried into the next chunk (10% of the maximum).
pub const CHUNK_OVERLAP_TOKENS: usize = 45;

/// Trailing chunks estimated below this are dropped.
pub const CHUNK_MIN_TOKENS: usize = 20;

/// Safety multiplier applied to heuristic token estimates.
pub const TOKEN_SAFETY_MARGIN: f64 = 1.1;

/// Hard character cap applied right before an embedding request.
pub const EMBED_MAX_CHARS: usize = 1800;

/// A sentence boundary is preferred when it falls within this trailing
/// fraction of truncated text.
pub const EMBED_SENTENCE_WINDOW: f64 = 0.2;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding endpoint (NVIDIA NIM, OpenAI-compatible with `input_type`).
pub const EMBED_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";

/// Default embedding model name.
pub const EMBED_MODEL: &str = "nvidia/nv-embedqa-e5-v5";

/// Default embedding vector dimension for the default model.
pub const EMBED_DIMENSION: usize = 1024;

/// Default embedding requests per minute.
pub const EMBED_REQUESTS_PER_MINUTE: u32 = 40;

/// Texts shorter than this (after sanitization) are rejected.
pub const EMBED_MIN_TEXT_CHARS: usize = 10;

/// Default embedding request timeout in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// SEARCH
// =============================================================================

/// RRF damping constant.
pub const RRF_K: f32 = 60.0;

/// Default weight of the vector branch; keyword weight is `1 - this`.
pub const VECTOR_WEIGHT: f32 = 0.7;

/// Vector results below this fraction of the top score are dropped.
pub const SIMILARITY_FLOOR_RATIO: f32 = 0.85;

/// A drop larger than this fraction between neighbours marks the elbow.
pub const SIMILARITY_MAX_DROP: f32 = 0.20;

/// Default number of fused results.
pub const SEARCH_LIMIT: usize = 10;

/// Upper bound on requested results.
pub const SEARCH_LIMIT_MAX: usize = 100;

/// Each branch fetches `limit * this` candidates before fusion.
pub const SEARCH_OVERFETCH: usize = 2;

/// Deadline applied to each retrieval branch, in seconds.
pub const SEARCH_BRANCH_TIMEOUT_SECS: u64 = 10;

/// Search cache TTL in seconds.
pub const SEARCH_CACHE_TTL_SECS: u64 = 300;

/// Search cache key prefix.
pub const SEARCH_CACHE_PREFIX: &str = "mnemo:search:";

// =============================================================================
// INDEXING
// =============================================================================

/// Deadline for fire-and-forget reindexing after a write, in seconds.
pub const REINDEX_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// ASK
// =============================================================================

/// Default number of personal documents placed into an answer's context.
pub const ASK_MAX_CONTEXT: usize = 5;

/// Web results scraped per web query.
pub const WEB_SCRAPE_TOP_N: usize = 2;

/// Characters kept from each scraped page.
pub const WEB_SCRAPE_MAX_CHARS: usize = 5000;

/// Bytes of a page body read before the rest is discarded.
pub const WEB_SCRAPE_MAX_BYTES: usize = 512 * 1024;

/// Maximum LLM-generated web queries in hybrid mode.
pub const HYBRID_MAX_QUERIES: usize = 3;

/// Deadline for a single web search or scrape, in seconds.
pub const WEB_TIMEOUT_SECS: u64 = 15;

/// Deadline for a provider completion call, in seconds.
pub const PROVIDER_TIMEOUT_SECS: u64 = 120;
