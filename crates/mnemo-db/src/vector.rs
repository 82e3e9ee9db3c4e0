//! pgvector-backed [`VectorIndex`].
//!
//! One row per document in `document_embedding`, keyed by
//! `(content_type, content_id)`. The single `index_meta` row records the
//! `(model, dimension)` the table was built with; opening the index with a
//! different embedder is refused until the index is rebuilt.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};
use uuid::Uuid;

use mnemo_core::{
    ContentType, Document, Embedder, Error, IndexStats, IndexVersion, Result, SearchResult,
    VectorIndex,
};

const DOCUMENT_COLUMNS: &str =
    "content_type, content_id, user_id, title, content, metadata, created_at";

fn document_from_row(row: &PgRow) -> Result<Document> {
    let content_type: String = row.get("content_type");
    let content_type = content_type.parse::<ContentType>().map_err(Error::Internal)?;
    let Json(metadata): Json<BTreeMap<String, String>> = row.get("metadata");
    Ok(Document {
        content_id: row.get("content_id"),
        content_type,
        user_id: row.get("user_id"),
        title: row.get("title"),
        content: row.get("content"),
        metadata,
        created_at: row.get("created_at"),
    })
}

pub(crate) fn content_type_names(content_types: &[ContentType]) -> Vec<String> {
    content_types.iter().map(|t| t.as_str().to_string()).collect()
}

/// Read the stored index version, if the index was ever written.
pub async fn stored_version(pool: &Pool<Postgres>) -> Result<Option<IndexVersion>> {
    let row = sqlx::query("SELECT model, dimension FROM index_meta WHERE singleton")
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)?;
    Ok(row.map(|r| IndexVersion {
        model: r.get("model"),
        dimension: r.get::<i32, _>("dimension") as usize,
    }))
}

/// Cosine nearest-neighbour index over `document_embedding`.
pub struct PgVectorIndex {
    pool: Pool<Postgres>,
    embedder: Arc<dyn Embedder>,
    version: IndexVersion,
}

impl PgVectorIndex {
    /// Open the index for `embedder`, pinning its version on first use.
    pub async fn open(pool: Pool<Postgres>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let current = embedder.version();
        match stored_version(&pool).await? {
            Some(stored) if stored != current => {
                return Err(Error::Config(format!(
                    "vector index was built with {} but embedder is {}; rebuild the index",
                    stored, current
                )));
            }
            Some(_) => {}
            None => {
                sqlx::query(
                    "INSERT INTO index_meta (singleton, model, dimension) VALUES (TRUE, $1, $2)
                     ON CONFLICT (singleton) DO NOTHING",
                )
                .bind(&current.model)
                .bind(current.dimension as i32)
                .execute(&pool)
                .await
                .map_err(Error::Database)?;
                info!(
                    subsystem = "database",
                    component = "vector_index",
                    version = %current,
                    "Pinned vector index version"
                );
            }
        }
        Ok(Self {
            pool,
            embedder,
            version: current,
        })
    }

    /// Drop every vector and the version pin, so a new model can be used.
    pub async fn rebuild(pool: &Pool<Postgres>) -> Result<u64> {
        let mut tx = pool.begin().await.map_err(Error::Database)?;
        let removed = sqlx::query("DELETE FROM document_embedding")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        sqlx::query("DELETE FROM index_meta")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;
        info!(
            subsystem = "database",
            component = "vector_index",
            op = "rebuild",
            removed,
            "Cleared vector index"
        );
        Ok(removed)
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    fn version(&self) -> IndexVersion {
        self.version.clone()
    }

    async fn add(&self, document: &Document) -> Result<()> {
        if self
            .get_by_content_id(document.content_type, document.content_id)
            .await?
            .is_some()
        {
            return Err(Error::Conflict(format!(
                "{} {} is already indexed",
                document.content_type, document.content_id
            )));
        }
        let embedding = self.embedder.embed_passage(&document.passage_text()).await?;
        if embedding.as_slice().len() != self.version.dimension {
            return Err(Error::Embedding(format!(
                "vector dimension {} does not match index dimension {}",
                embedding.as_slice().len(),
                self.version.dimension
            )));
        }

        let inserted = sqlx::query(
            "INSERT INTO document_embedding
                 (content_type, content_id, user_id, title, content, metadata, created_at,
                  model, dimension, embedding)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (content_type, content_id) DO NOTHING",
        )
        .bind(document.content_type.as_str())
        .bind(document.content_id)
        .bind(document.user_id)
        .bind(&document.title)
        .bind(&document.content)
        .bind(Json(&document.metadata))
        .bind(document.created_at)
        .bind(&self.version.model)
        .bind(self.version.dimension as i32)
        .bind(&embedding)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?
        .rows_affected();
        if inserted == 0 {
            return Err(Error::Conflict(format!(
                "{} {} is already indexed",
                document.content_type, document.content_id
            )));
        }
        Ok(())
    }

    async fn search_by_user(
        &self,
        user_id: Uuid,
        query: &str,
        k: usize,
        content_types: &[ContentType],
    ) -> Result<Vec<SearchResult>> {
        let start = Instant::now();
        let query_vec: Vector = self.embedder.embed_query(query).await?;

        let sql = format!(
            r#"
            SELECT {DOCUMENT_COLUMNS},
                   1.0 - (embedding <=> $1::vector) AS score
            FROM document_embedding
            WHERE user_id = $2
              AND model = $3
              AND (cardinality($4::text[]) = 0 OR content_type = ANY($4))
            ORDER BY embedding <=> $1::vector, content_type, content_id
            LIMIT $5
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(&query_vec)
            .bind(user_id)
            .bind(&self.version.model)
            .bind(content_type_names(content_types))
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let results = rows
            .iter()
            .map(|row| {
                let score = (row.get::<f64, _>("score") as f32).max(0.0);
                Ok(SearchResult::vector(document_from_row(row)?, score))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            subsystem = "database",
            component = "vector_index",
            op = "search",
            result_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Vector search complete"
        );
        Ok(results)
    }

    async fn get_by_content_id(
        &self,
        content_type: ContentType,
        content_id: Uuid,
    ) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM document_embedding WHERE content_type = $1 AND content_id = $2",
            DOCUMENT_COLUMNS
        ))
        .bind(content_type.as_str())
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn delete_by_content_id(
        &self,
        content_type: ContentType,
        content_id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM document_embedding WHERE content_type = $1 AND content_id = $2",
        )
        .bind(content_type.as_str())
        .bind(content_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM document_embedding WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_embedding")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(IndexStats {
            documents: documents as usize,
            version: Some(self.version.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_names() {
        assert_eq!(
            content_type_names(&[ContentType::Todo, ContentType::Memory]),
            vec!["todo", "memory"]
        );
        assert!(content_type_names(&[]).is_empty());
    }
}
