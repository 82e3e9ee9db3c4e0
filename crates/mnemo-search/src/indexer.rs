//! Keeps the vector index in step with the content store.
//!
//! Writes to the SQL records are authoritative; index maintenance happens
//! after them and never blocks or fails them. Updates are delete-then-add
//! so an index never holds two copies of one record.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use mnemo_core::{
    defaults, ContentStore, ContentType, Document, Embedder, Error, IndexReport, Result,
    SearchCache, VectorIndex,
};

/// Index maintenance for one vector index.
#[derive(Clone)]
pub struct Indexer {
    vector: Arc<dyn VectorIndex>,
    store: Arc<dyn ContentStore>,
    cache: Option<Arc<dyn SearchCache>>,
    timeout: Duration,
}

impl Indexer {
    pub fn new(vector: Arc<dyn VectorIndex>, store: Arc<dyn ContentStore>) -> Self {
        Self {
            vector,
            store,
            cache: None,
            timeout: Duration::from_secs(defaults::REINDEX_TIMEOUT_SECS),
        }
    }

    /// Refuse to pair an index with an embedder of a different model.
    pub fn checked(
        vector: Arc<dyn VectorIndex>,
        store: Arc<dyn ContentStore>,
        embedder: &dyn Embedder,
    ) -> Result<Self> {
        let index_version = vector.version();
        let embedder_version = embedder.version();
        if index_version != embedder_version {
            return Err(Error::Config(format!(
                "vector index holds {} vectors but embedder produces {}",
                index_version, embedder_version
            )));
        }
        Ok(Self::new(vector, store))
    }

    /// Invalidate a user's cached searches after each change.
    pub fn with_cache(mut self, cache: Arc<dyn SearchCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Deadline for background index updates.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Rebuild every document of one user from the content store.
    ///
    /// Documents whose indexed copy is already current are skipped without
    /// embedding, as are documents too short to embed. Other failures are
    /// counted and the backfill continues.
    #[instrument(skip(self), fields(
        subsystem = "search",
        component = "indexer",
        op = "index_all_for_user",
        user_id = %user_id,
    ))]
    pub async fn index_all_for_user(&self, user_id: Uuid) -> Result<IndexReport> {
        let start = Instant::now();
        let todos = self.store.list_todos(user_id).await?;
        let memories = self.store.list_memories(user_id).await?;

        let documents: Vec<Document> = todos
            .into_iter()
            .map(Document::from)
            .chain(memories.into_iter().map(Document::from))
            .collect();

        let mut report = IndexReport::default();
        for document in &documents {
            if self.is_indexed(document).await {
                report.skipped += 1;
                continue;
            }
            match self.replace(document).await {
                Ok(()) => report.indexed += 1,
                Err(Error::InvalidInput(reason)) => {
                    debug!(
                        content_type = %document.content_type,
                        content_id = %document.content_id,
                        reason = %reason,
                        "Skipping document"
                    );
                    report.skipped += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        content_type = %document.content_type,
                        content_id = %document.content_id,
                        error = %e,
                        "Failed to index document"
                    );
                    report.errors += 1;
                }
            }
        }
        self.invalidate(user_id).await;

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            documents = documents.len(),
            indexed = report.indexed,
            skipped = report.skipped,
            errors = report.errors,
            duration_ms = report.elapsed_ms,
            "Backfill complete"
        );
        Ok(report)
    }

    /// Index one document, replacing any earlier copy.
    pub async fn index_one(&self, document: &Document) -> Result<()> {
        self.replace(document).await?;
        self.invalidate(document.user_id).await;
        Ok(())
    }

    /// Remove one record from the index.
    pub async fn delete_one(
        &self,
        user_id: Uuid,
        content_type: ContentType,
        content_id: Uuid,
    ) -> Result<bool> {
        let removed = self
            .vector
            .delete_by_content_id(content_type, content_id)
            .await?;
        self.invalidate(user_id).await;
        Ok(removed)
    }

    /// Bring one record's index entry in line with the store: re-index it
    /// if it exists, remove it if it doesn't.
    pub async fn sync_one(
        &self,
        user_id: Uuid,
        content_type: ContentType,
        content_id: Uuid,
    ) -> Result<()> {
        match self
            .store
            .get_document(user_id, content_type, content_id)
            .await?
        {
            Some(document) => self.index_one(&document).await,
            None => self
                .delete_one(user_id, content_type, content_id)
                .await
                .map(|_| ()),
        }
    }

    /// Re-index a record in the background after its SQL write.
    ///
    /// Failures and timeouts are logged; the caller's write has already
    /// succeeded and is not affected.
    pub fn spawn_index_one(&self, document: Document) -> JoinHandle<()> {
        let indexer = self.clone();
        let key = document.key();
        tokio::spawn(async move {
            match tokio::time::timeout(indexer.timeout, indexer.index_one(&document)).await {
                Ok(Ok(())) => debug!(
                    subsystem = "search",
                    component = "indexer",
                    content_type = %key.content_type,
                    content_id = %key.content_id,
                    "Background index complete"
                ),
                Ok(Err(e)) => warn!(
                    subsystem = "search",
                    component = "indexer",
                    content_type = %key.content_type,
                    content_id = %key.content_id,
                    error = %e,
                    "Background index failed"
                ),
                Err(_) => warn!(
                    subsystem = "search",
                    component = "indexer",
                    content_type = %key.content_type,
                    content_id = %key.content_id,
                    timeout_ms = indexer.timeout.as_millis() as u64,
                    "Background index timed out"
                ),
            }
        })
    }

    /// Remove a record from the index in the background after its SQL delete.
    pub fn spawn_delete_one(
        &self,
        user_id: Uuid,
        content_type: ContentType,
        content_id: Uuid,
    ) -> JoinHandle<()> {
        let indexer = self.clone();
        tokio::spawn(async move {
            let deletion = indexer.delete_one(user_id, content_type, content_id);
            match tokio::time::timeout(indexer.timeout, deletion).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(
                    subsystem = "search",
                    component = "indexer",
                    content_type = %content_type,
                    content_id = %content_id,
                    error = %e,
                    "Background index delete failed"
                ),
                Err(_) => warn!(
                    subsystem = "search",
                    component = "indexer",
                    content_type = %content_type,
                    content_id = %content_id,
                    "Background index delete timed out"
                ),
            }
        })
    }

    /// Delete every trace of a user.
    ///
    /// The index is cleared first; a failure there is logged and the SQL
    /// deletion still runs. The SQL result is what the caller gets back.
    #[instrument(skip(self, delete_records), fields(
        subsystem = "search",
        component = "indexer",
        op = "wipe_user",
        user_id = %user_id,
    ))]
    pub async fn wipe_user<F, Fut>(&self, user_id: Uuid, delete_records: F) -> Result<u64>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64>>,
    {
        match self.vector.delete_by_user(user_id).await {
            Ok(removed) => debug!(removed, "Index entries removed"),
            Err(e) => warn!(error = %e, "Index wipe failed, deleting records anyway"),
        }
        self.invalidate(user_id).await;

        let deleted = delete_records().await?;
        info!(deleted, "User data deleted");
        Ok(deleted)
    }

    /// Whether the index already holds this exact version of the document.
    async fn is_indexed(&self, document: &Document) -> bool {
        match self
            .vector
            .get_by_content_id(document.content_type, document.content_id)
            .await
        {
            Ok(Some(indexed)) => is_current(&indexed, document),
            Ok(None) => false,
            Err(e) => {
                debug!(
                    content_type = %document.content_type,
                    content_id = %document.content_id,
                    error = %e,
                    "Existence check failed, re-indexing"
                );
                false
            }
        }
    }

    async fn replace(&self, document: &Document) -> Result<()> {
        self.vector
            .delete_by_content_id(document.content_type, document.content_id)
            .await?;
        self.vector.add(document).await
    }

    async fn invalidate(&self, user_id: Uuid) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.invalidate_user(user_id).await {
                warn!(
                    subsystem = "search",
                    component = "indexer",
                    user_id = %user_id,
                    error = %e,
                    "Search cache invalidation failed"
                );
            }
        }
    }
}

fn is_current(indexed: &Document, document: &Document) -> bool {
    indexed.user_id == document.user_id
        && indexed.title == document.title
        && indexed.content == document.content
        && indexed.metadata == document.metadata
}
