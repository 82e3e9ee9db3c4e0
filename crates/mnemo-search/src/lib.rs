//! # mnemo-search
//!
//! Hybrid retrieval for mnemo.
//!
//! This crate provides:
//! - [`HybridSearchEngine`]: concurrent keyword and vector retrieval fused
//!   with weighted RRF, enriched from the content store, optionally cached
//! - [`similarity_prefilter`]: cuts weak vector matches before fusion
//! - [`prepare_fts_query`]: free text to safe prefix-term queries
//! - [`Indexer`]: backfill, per-record sync and user wipe
//! - [`RedisSearchCache`]: Redis-backed response cache
//! - In-memory index, store and cache implementations in [`memory`]

pub mod cache;
pub mod filter;
pub mod hybrid;
pub mod indexer;
pub mod keyword;
pub mod memory;
pub mod rrf;

pub use cache::{search_cache_key, RedisSearchCache};
pub use filter::{similarity_prefilter, PrefilterConfig};
pub use hybrid::{HybridSearchConfig, HybridSearchEngine};
pub use indexer::Indexer;
pub use keyword::{prefix_terms, prepare_fts_query};
pub use memory::{cosine_similarity, MemoryContentStore, MemorySearchCache, MemoryVectorIndex};
pub use rrf::{rrf_fuse, rrf_fuse_with_k, RankedList, RRF_K};
