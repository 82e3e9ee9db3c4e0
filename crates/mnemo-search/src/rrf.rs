//! Weighted Reciprocal Rank Fusion (RRF) for combining search results.

use std::collections::HashMap;

use tracing::debug;

use mnemo_core::{defaults, DocumentKey, MatchType, SearchResult};

/// RRF constant. Each list contributes `weight / (RRF_K + rank)` with
/// 1-based ranks.
pub const RRF_K: f32 = defaults::RRF_K;

/// One ranked input to fusion.
#[derive(Debug, Clone)]
pub struct RankedList {
    pub results: Vec<SearchResult>,
    pub weight: f32,
}

impl RankedList {
    pub fn new(results: Vec<SearchResult>, weight: f32) -> Self {
        Self { results, weight }
    }
}

/// Fuse ranked lists into one list ordered by fused score.
///
/// Documents are identified by `(content_type, content_id)`. A document
/// found by more than one branch becomes [`MatchType::Hybrid`] and keeps
/// every highlight it was given. Ties are broken by content type, then
/// content id, so the output is deterministic.
pub fn rrf_fuse(lists: Vec<RankedList>, limit: usize) -> Vec<SearchResult> {
    rrf_fuse_with_k(lists, RRF_K, limit)
}

/// [`rrf_fuse`] with an explicit `k`.
pub fn rrf_fuse_with_k(lists: Vec<RankedList>, k: f32, limit: usize) -> Vec<SearchResult> {
    let input_lists = lists.len();
    let mut fused: HashMap<DocumentKey, SearchResult> = HashMap::new();

    for list in lists {
        if list.weight <= 0.0 {
            continue;
        }
        for (rank, result) in list.results.into_iter().enumerate() {
            let contribution = list.weight / (k + rank as f32 + 1.0);
            match fused.get_mut(&result.document.key()) {
                Some(existing) => {
                    existing.score += contribution;
                    if existing.match_type != result.match_type {
                        existing.match_type = MatchType::Hybrid;
                    }
                    for highlight in result.highlights {
                        if !existing.highlights.contains(&highlight) {
                            existing.highlights.push(highlight);
                        }
                    }
                }
                None => {
                    let key = result.document.key();
                    fused.insert(
                        key,
                        SearchResult {
                            score: contribution,
                            ..result
                        },
                    );
                }
            }
        }
    }

    let mut results: Vec<SearchResult> = fused.into_values().collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document.key().cmp(&b.document.key()))
    });
    results.truncate(limit);

    debug!(
        subsystem = "search",
        component = "rrf",
        input_lists,
        rrf_k = k,
        result_count = results.len(),
        "RRF fusion complete"
    );

    results
}
