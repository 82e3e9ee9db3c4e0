//! Hybrid search combining keyword and vector retrieval.
//!
//! Both branches run concurrently, each under its own deadline. A branch
//! that fails, panics or times out contributes nothing and the search
//! carries on with the other one. Vector hits pass through the similarity
//! pre-filter, both lists are fused with weighted RRF, and every surviving
//! result is re-read from the content store so callers always see the
//! current record rather than the indexed copy.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use mnemo_core::{
    defaults, ContentStore, ContentType, Error, KeywordHit, KeywordIndex, Result, SearchCache,
    SearchRequest, SearchResponse, SearchResult, VectorIndex,
};

use crate::cache::search_cache_key;
use crate::filter::{similarity_prefilter, PrefilterConfig};
use crate::keyword::prepare_fts_query;
use crate::rrf::{rrf_fuse_with_k, RankedList};

/// Configuration for hybrid search.
#[derive(Debug, Clone)]
pub struct HybridSearchConfig {
    /// RRF constant.
    pub rrf_k: f32,
    /// Vector pre-filter thresholds.
    pub prefilter: PrefilterConfig,
    /// Each branch fetches `limit * overfetch` candidates.
    pub overfetch: usize,
    /// Upper bound on a request's limit.
    pub max_limit: usize,
    /// Deadline for each retrieval branch.
    pub branch_timeout: Duration,
    /// Lifetime of cached responses.
    pub cache_ttl: Duration,
    /// Cache key prefix.
    pub cache_prefix: String,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: defaults::RRF_K,
            prefilter: PrefilterConfig::default(),
            overfetch: defaults::SEARCH_OVERFETCH,
            max_limit: defaults::SEARCH_LIMIT_MAX,
            branch_timeout: Duration::from_secs(defaults::SEARCH_BRANCH_TIMEOUT_SECS),
            cache_ttl: Duration::from_secs(defaults::SEARCH_CACHE_TTL_SECS),
            cache_prefix: defaults::SEARCH_CACHE_PREFIX.to_string(),
        }
    }
}

impl HybridSearchConfig {
    /// Defaults overridden by `SEARCH_BRANCH_TIMEOUT_SECS` and
    /// `REDIS_CACHE_TTL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_u64("SEARCH_BRANCH_TIMEOUT_SECS") {
            config.branch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("REDIS_CACHE_TTL") {
            config.cache_ttl = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_rrf_k(mut self, k: f32) -> Self {
        self.rrf_k = k;
        self
    }

    pub fn with_prefilter(mut self, prefilter: PrefilterConfig) -> Self {
        self.prefilter = prefilter;
        self
    }

    pub fn with_branch_timeout(mut self, timeout: Duration) -> Self {
        self.branch_timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Hybrid search engine over a vector index, a keyword index and the
/// authoritative content store.
pub struct HybridSearchEngine {
    vector: Arc<dyn VectorIndex>,
    keyword: Arc<dyn KeywordIndex>,
    store: Arc<dyn ContentStore>,
    cache: Option<Arc<dyn SearchCache>>,
    config: HybridSearchConfig,
}

impl HybridSearchEngine {
    pub fn new(
        vector: Arc<dyn VectorIndex>,
        keyword: Arc<dyn KeywordIndex>,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            vector,
            keyword,
            store,
            cache: None,
            config: HybridSearchConfig::default(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn SearchCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_config(mut self, config: HybridSearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &HybridSearchConfig {
        &self.config
    }

    pub fn vector_index(&self) -> &Arc<dyn VectorIndex> {
        &self.vector
    }

    /// Clamp limit and weight into their valid ranges.
    fn normalize(&self, request: &SearchRequest) -> SearchRequest {
        let vector_weight = if request.vector_weight.is_finite() {
            request.vector_weight.clamp(0.0, 1.0)
        } else {
            defaults::VECTOR_WEIGHT
        };
        let mut content_types = request.content_types.clone();
        content_types.sort_unstable();
        content_types.dedup();
        SearchRequest {
            user_id: request.user_id,
            query: request.query.trim().to_string(),
            limit: request.limit.clamp(1, self.config.max_limit),
            vector_weight,
            content_types,
        }
    }

    /// Run a hybrid search for one user.
    #[instrument(skip(self, request), fields(
        subsystem = "search",
        component = "hybrid_search",
        op = "search",
        user_id = %request.user_id,
        limit = request.limit,
        vector_weight = request.vector_weight,
    ))]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();
        let request = self.normalize(request);

        if request.query.is_empty() {
            debug!("Empty query, nothing to search");
            return Ok(empty_response(start));
        }

        let cache_key = search_cache_key(&self.config.cache_prefix, &request);
        if let Some(mut cached) = self.cache_get(&cache_key).await {
            cached.cached = true;
            cached.elapsed_ms = start.elapsed().as_millis() as u64;
            info!(
                result_count = cached.results.len(),
                duration_ms = cached.elapsed_ms,
                "Hybrid search served from cache"
            );
            return Ok(cached);
        }

        let fetch = request.limit * self.config.overfetch.max(1);
        let vector_weight = request.vector_weight;
        let keyword_weight = request.keyword_weight();

        let vector_branch = async {
            if vector_weight <= 0.0 {
                return Vec::new();
            }
            let index = Arc::clone(&self.vector);
            let user_id = request.user_id;
            let query = request.query.clone();
            let types = request.content_types.clone();
            run_branch("vector", self.config.branch_timeout, async move {
                index.search_by_user(user_id, &query, fetch, &types).await
            })
            .await
        };

        let keyword_branch = async {
            if keyword_weight <= 0.0 {
                return Vec::new();
            }
            let index = Arc::clone(&self.keyword);
            let user_id = request.user_id;
            let query = prepare_fts_query(&request.query);
            let types = request.content_types.clone();
            run_branch("keyword", self.config.branch_timeout, async move {
                let hits = index.search(user_id, &query, &types, fetch).await?;
                Ok::<_, Error>(hits.into_iter().map(KeywordHit::into_result).collect())
            })
            .await
        };

        let (vector_results, keyword_results) = tokio::join!(vector_branch, keyword_branch);
        let vector_count = vector_results.len();
        let keyword_count = keyword_results.len();

        let vector_results = similarity_prefilter(vector_results, &self.config.prefilter);

        let fusion_start = Instant::now();
        let fused = rrf_fuse_with_k(
            vec![
                RankedList::new(vector_results, vector_weight),
                RankedList::new(keyword_results, keyword_weight),
            ],
            self.config.rrf_k,
            request.limit,
        );
        debug!(
            fusion_method = "rrf",
            result_count = fused.len(),
            duration_ms = fusion_start.elapsed().as_millis() as u64,
            "Fusion complete"
        );

        let results = self.enrich(request.user_id, fused).await;
        let response = SearchResponse {
            total_count: results.len(),
            results,
            elapsed_ms: start.elapsed().as_millis() as u64,
            cached: false,
        };

        self.cache_set(&cache_key, &response).await;

        info!(
            vector_hits = vector_count,
            keyword_hits = keyword_count,
            result_count = response.results.len(),
            duration_ms = response.elapsed_ms,
            "Hybrid search completed"
        );
        Ok(response)
    }

    /// Replace indexed copies with the current records.
    ///
    /// Results whose record no longer exists are dropped. If the store
    /// cannot be read the indexed copy is kept.
    async fn enrich(&self, user_id: uuid::Uuid, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let lookups = results.into_iter().map(|result| {
            let store = Arc::clone(&self.store);
            async move {
                let content_type = result.document.content_type;
                if content_type == ContentType::Web {
                    return Some(result);
                }
                let content_id = result.document.content_id;
                match store.get_document(user_id, content_type, content_id).await {
                    Ok(Some(document)) => Some(SearchResult { document, ..result }),
                    Ok(None) => {
                        debug!(
                            content_type = %content_type,
                            content_id = %content_id,
                            "Dropping result for deleted record"
                        );
                        None
                    }
                    Err(e) => {
                        warn!(
                            content_type = %content_type,
                            content_id = %content_id,
                            error = %e,
                            "Content store lookup failed, keeping indexed copy"
                        );
                        Some(result)
                    }
                }
            }
        });
        join_all(lookups).await.into_iter().flatten().collect()
    }

    async fn cache_get(&self, key: &str) -> Option<SearchResponse> {
        let cache = self.cache.as_ref()?;
        match cache.get_json(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(response) => Some(response),
                Err(e) => {
                    warn!(error = %e, "Cached search response is unreadable");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Search cache read failed");
                None
            }
        }
    }

    async fn cache_set(&self, key: &str, response: &SearchResponse) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let value = match serde_json::to_value(response) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Search response serialization failed");
                return;
            }
        };
        if let Err(e) = cache.set_json(key, &value, self.config.cache_ttl).await {
            warn!(error = %e, "Search cache write failed");
        }
    }
}

fn empty_response(start: Instant) -> SearchResponse {
    SearchResponse {
        results: Vec::new(),
        total_count: 0,
        elapsed_ms: start.elapsed().as_millis() as u64,
        cached: false,
    }
}

/// Run one retrieval branch on its own task under a deadline.
///
/// Any failure yields an empty list.
async fn run_branch<F>(branch: &'static str, deadline: Duration, fut: F) -> Vec<SearchResult>
where
    F: Future<Output = Result<Vec<SearchResult>>> + Send + 'static,
{
    let start = Instant::now();
    let mut handle = tokio::spawn(fut);
    match tokio::time::timeout(deadline, &mut handle).await {
        Ok(Ok(Ok(results))) => {
            debug!(
                branch,
                hits = results.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Retrieval branch complete"
            );
            results
        }
        Ok(Ok(Err(e))) => {
            warn!(branch, error = %e, "Retrieval branch failed, continuing without it");
            Vec::new()
        }
        Ok(Err(e)) => {
            warn!(branch, error = %e, "Retrieval branch panicked, continuing without it");
            Vec::new()
        }
        Err(_) => {
            handle.abort();
            warn!(
                branch,
                timeout_ms = deadline.as_millis() as u64,
                "Retrieval branch timed out, continuing without it"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn engine() -> HybridSearchEngine {
        let store = Arc::new(crate::memory::MemoryContentStore::new());
        let embedder = Arc::new(mnemo_inference::EmbeddingClient::new(
            Arc::new(mnemo_inference::mock::MockEmbeddingBackend::new()),
            Arc::new(mnemo_inference::RateLimiter::unlimited()),
        ));
        HybridSearchEngine::new(
            Arc::new(crate::memory::MemoryVectorIndex::new(embedder)),
            store.clone(),
            store,
        )
    }

    #[test]
    fn test_normalize_clamps_limit_and_weight() {
        let engine = engine();
        let request = SearchRequest::new(Uuid::nil(), "  query  ")
            .with_limit(1000)
            .with_vector_weight(1.5);
        let normalized = engine.normalize(&request);
        assert_eq!(normalized.limit, defaults::SEARCH_LIMIT_MAX);
        assert_eq!(normalized.vector_weight, 1.0);
        assert_eq!(normalized.query, "query");

        let zero = engine.normalize(&SearchRequest::new(Uuid::nil(), "q").with_limit(0));
        assert_eq!(zero.limit, 1);

        let nan = engine.normalize(&SearchRequest::new(Uuid::nil(), "q").with_vector_weight(f32::NAN));
        assert_eq!(nan.vector_weight, defaults::VECTOR_WEIGHT);
    }

    #[tokio::test]
    async fn test_empty_query_returns_no_results() {
        let response = engine()
            .search(&SearchRequest::new(Uuid::nil(), "   "))
            .await
            .unwrap();
        assert!(response.results.is_empty());
        assert_eq!(response.total_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_branch_times_out() {
        let results = run_branch("slow", Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, Error>(Vec::new())
        })
        .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_run_branch_swallows_errors() {
        let results = run_branch("broken", Duration::from_secs(1), async {
            Err::<Vec<SearchResult>, _>(Error::Retrieval("index offline".to_string()))
        })
        .await;
        assert!(results.is_empty());
    }
}
