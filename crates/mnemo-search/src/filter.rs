//! Similarity pre-filter for vector results.
//!
//! Nearest-neighbour search always returns `k` results no matter how weak
//! the match. Before fusion the vector list is cut relative to its own best
//! score: anything far below the top, and everything after the first steep
//! drop (the "elbow"), is discarded. Results with no similarity at all
//! never survive.

use tracing::debug;

use mnemo_core::{defaults, SearchResult};

/// Pre-filter thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefilterConfig {
    /// Keep results scoring at least `floor_ratio * top_score`.
    pub floor_ratio: f32,
    /// Stop at the first result more than this fraction below its
    /// predecessor.
    pub max_drop: f32,
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        Self {
            floor_ratio: defaults::SIMILARITY_FLOOR_RATIO,
            max_drop: defaults::SIMILARITY_MAX_DROP,
        }
    }
}

/// Filter vector results, which must be sorted by score descending.
pub fn similarity_prefilter(
    results: Vec<SearchResult>,
    config: &PrefilterConfig,
) -> Vec<SearchResult> {
    let Some(top) = results.first().map(|r| r.score) else {
        return results;
    };
    let input = results.len();
    let floor = top * config.floor_ratio;

    let mut kept: Vec<SearchResult> = Vec::with_capacity(results.len());
    for result in results {
        if let Some(previous) = kept.last() {
            if previous.score > 0.0 && result.score < previous.score * (1.0 - config.max_drop) {
                break;
            }
        }
        if result.score <= 0.0 || result.score < floor {
            break;
        }
        kept.push(result);
    }

    debug!(
        subsystem = "search",
        component = "prefilter",
        top_score = top,
        input,
        kept = kept.len(),
        "Similarity pre-filter applied"
    );
    kept
}
