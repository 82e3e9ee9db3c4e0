//! Full-text [`KeywordIndex`] over the todo and memory tables.
//!
//! Both tables carry a generated `tsv` column (title weighted `A`, body
//! weighted `B`) under the `simple` configuration, so prefix terms match
//! literally without stemming. Free text is reduced to conjunctive prefix
//! terms (`renew:* & passport:*`) before it reaches `to_tsquery`.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use mnemo_core::{ContentType, Document, Error, KeywordHit, KeywordIndex, Result};
use mnemo_search::{prefix_terms, prepare_fts_query};

use crate::content::{memory_from_row, todo_from_row, MEMORY_COLUMNS, TODO_COLUMNS};

const HEADLINE_OPTIONS: &str =
    "StartSel=<b>, StopSel=</b>, MaxWords=24, MinWords=8, MaxFragments=2";

/// `to_tsquery` text for a free-text query, or `None` when nothing is
/// searchable.
pub fn to_prefix_tsquery(query: &str) -> Option<String> {
    let terms = prefix_terms(&prepare_fts_query(query));
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("{}:*", t))
            .collect::<Vec<_>>()
            .join(" & "),
    )
}

/// PostgreSQL full-text search for todos and memories.
#[derive(Clone)]
pub struct PgKeywordIndex {
    pool: Pool<Postgres>,
}

impl PgKeywordIndex {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn search_table(
        &self,
        content_type: ContentType,
        user_id: Uuid,
        tsquery: &str,
        limit: usize,
    ) -> Result<Vec<KeywordHit>> {
        let (table, columns, body) = match content_type {
            ContentType::Todo => ("todo", TODO_COLUMNS, "description"),
            ContentType::Memory => ("memory", MEMORY_COLUMNS, "content"),
            ContentType::Web => return Ok(Vec::new()),
        };

        let sql = format!(
            r#"
            SELECT {columns},
                   -ts_rank_cd(tsv, q)::float8 AS rank,
                   ts_headline('simple', title || ' ' || {body}, q, '{HEADLINE_OPTIONS}') AS snippet
            FROM {table}, to_tsquery('simple', $2) q
            WHERE user_id = $1 AND tsv @@ q
            ORDER BY rank, id
            LIMIT $3
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(tsquery)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|row| {
                let document = match content_type {
                    ContentType::Todo => Document::from(todo_from_row(row)),
                    _ => Document::from(memory_from_row(row)),
                };
                KeywordHit {
                    document,
                    rank: row.get("rank"),
                    snippet: row.get("snippet"),
                }
            })
            .collect())
    }
}

#[async_trait]
impl KeywordIndex for PgKeywordIndex {
    async fn search(
        &self,
        user_id: Uuid,
        query: &str,
        content_types: &[ContentType],
        limit: usize,
    ) -> Result<Vec<KeywordHit>> {
        let Some(tsquery) = to_prefix_tsquery(query) else {
            return Ok(Vec::new());
        };
        let start = Instant::now();

        let mut hits = Vec::new();
        for content_type in ContentType::PERSONAL {
            if !content_types.is_empty() && !content_types.contains(&content_type) {
                continue;
            }
            hits.extend(
                self.search_table(content_type, user_id, &tsquery, limit)
                    .await?,
            );
        }

        hits.sort_by(|a, b| {
            a.rank
                .partial_cmp(&b.rank)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.key().cmp(&b.document.key()))
        });
        hits.truncate(limit);

        debug!(
            subsystem = "database",
            component = "keyword_index",
            op = "search",
            result_count = hits.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Keyword search complete"
        );
        Ok(hits)
    }
}
