//! Backfill, per-record sync and user wipe.

mod helpers;

use std::sync::Arc;

use helpers::{memory, todo, Stack};
use mnemo_core::{ContentStore, ContentType, Document, Embedder, Error, VectorIndex};
use mnemo_inference::mock::MockEmbeddingBackend;
use mnemo_inference::{EmbeddingClient, RateLimiter};
use mnemo_search::{Indexer, MemoryVectorIndex};
use uuid::Uuid;

#[tokio::test]
async fn test_backfill_indexes_todos_and_memories() {
    let stack = Stack::new();
    let alice = Uuid::new_v4();
    stack
        .store
        .upsert_memory(memory(alice, "Book club", "Next book is Dune, meeting Thursday"))
        .await;
    stack
        .store
        .upsert_todo(todo(alice, "Pay rent", "Transfer rent before the first"))
        .await;
    // Too short to embed.
    stack.store.upsert_memory(memory(alice, "", "ok")).await;

    let report = stack.indexer().index_all_for_user(alice).await.unwrap();
    assert_eq!(report.indexed, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors, 0);
    assert_eq!(stack.index.len().await, 2);
}

#[tokio::test]
async fn test_backfill_is_idempotent() {
    let stack = Stack::new();
    let alice = Uuid::new_v4();
    stack
        .store
        .upsert_memory(memory(alice, "Book club", "Next book is Dune, meeting Thursday"))
        .await;
    stack
        .store
        .upsert_todo(todo(alice, "Pay rent", "Transfer rent before the first"))
        .await;

    let indexer = stack.indexer();
    let first = indexer.index_all_for_user(alice).await.unwrap();
    assert_eq!(first.indexed, 2);
    let embed_calls = stack.backend.request_count();
    assert_eq!(embed_calls, 2);

    let second = indexer.index_all_for_user(alice).await.unwrap();
    assert_eq!(second.indexed, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(stack.backend.request_count(), embed_calls);
    assert_eq!(stack.index.stats().await.unwrap().documents, 2);
}

#[tokio::test]
async fn test_backfill_reembeds_only_changed_records() {
    let stack = Stack::new();
    let alice = Uuid::new_v4();
    let mut m = memory(alice, "Garage code", "The garage code is 1234");
    stack.store.upsert_memory(m.clone()).await;
    stack
        .store
        .upsert_todo(todo(alice, "Pay rent", "Transfer rent before the first"))
        .await;

    let indexer = stack.indexer();
    indexer.index_all_for_user(alice).await.unwrap();
    let embed_calls = stack.backend.request_count();

    m.content = "The garage code changed to 9876".to_string();
    stack.store.upsert_memory(m.clone()).await;

    let report = indexer.index_all_for_user(alice).await.unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(stack.backend.request_count(), embed_calls + 1);
    let indexed = stack
        .index
        .get_by_content_id(ContentType::Memory, m.id)
        .await
        .unwrap()
        .unwrap();
    assert!(indexed.content.contains("9876"));
}

#[tokio::test]
async fn test_backfill_only_touches_one_user() {
    let stack = Stack::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    stack
        .store
        .upsert_memory(memory(alice, "Alice note", "Alice likes green tea"))
        .await;
    stack
        .store
        .upsert_memory(memory(bob, "Bob note", "Bob likes black coffee"))
        .await;

    let report = stack.indexer().index_all_for_user(alice).await.unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(stack.index.len().await, 1);
}

#[tokio::test]
async fn test_sync_one_reindexes_and_removes() {
    let stack = Stack::new();
    let alice = Uuid::new_v4();
    let indexer = stack.indexer();

    let mut m = memory(alice, "Garage code", "The garage code is 1234");
    stack.store.upsert_memory(m.clone()).await;
    indexer
        .sync_one(alice, ContentType::Memory, m.id)
        .await
        .unwrap();
    assert_eq!(stack.index.len().await, 1);

    m.content = "The garage code changed to 9876".to_string();
    stack.store.upsert_memory(m.clone()).await;
    indexer
        .sync_one(alice, ContentType::Memory, m.id)
        .await
        .unwrap();
    let indexed = stack
        .index
        .get_by_content_id(ContentType::Memory, m.id)
        .await
        .unwrap()
        .unwrap();
    assert!(indexed.content.contains("9876"));
    assert_eq!(stack.index.len().await, 1);

    stack.store.remove_memory(m.id).await;
    indexer
        .sync_one(alice, ContentType::Memory, m.id)
        .await
        .unwrap();
    assert!(stack.index.is_empty().await);
}

#[tokio::test]
async fn test_spawned_updates_complete_in_background() {
    let stack = Stack::new();
    let alice = Uuid::new_v4();
    let indexer = stack.indexer();

    let t = todo(alice, "Water plants", "Water the ficus and the fern");
    stack.store.upsert_todo(t.clone()).await;
    indexer
        .spawn_index_one(Document::from(t.clone()))
        .await
        .unwrap();
    assert_eq!(stack.index.len().await, 1);

    indexer
        .spawn_delete_one(alice, ContentType::Todo, t.id)
        .await
        .unwrap();
    assert!(stack.index.is_empty().await);
}

#[tokio::test]
async fn test_spawned_failure_is_only_logged() {
    let stack = Stack::with_backend(MockEmbeddingBackend::new().failing());
    let alice = Uuid::new_v4();
    let t = todo(alice, "Water plants", "Water the ficus and the fern");

    // The task finishes normally even though indexing failed.
    stack
        .indexer()
        .spawn_index_one(Document::from(t))
        .await
        .unwrap();
    assert!(stack.index.is_empty().await);
}

#[tokio::test]
async fn test_wipe_user_clears_index_and_records() {
    let stack = Stack::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    stack
        .add_memory(alice, "Alice note", "Alice likes green tea")
        .await;
    stack.add_todo(alice, "Alice todo", "Buy more green tea").await;
    stack.add_memory(bob, "Bob note", "Bob likes black coffee").await;

    let store = stack.store.clone();
    let deleted = stack
        .indexer()
        .wipe_user(alice, || async move { Ok(store.delete_user(alice).await) })
        .await
        .unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(stack.index.len().await, 1);
    assert!(stack.store.list_memories(alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_wipe_user_reports_record_deletion_failure() {
    let stack = Stack::new();
    let alice = Uuid::new_v4();
    stack
        .add_memory(alice, "Alice note", "Alice likes green tea")
        .await;

    let err = stack
        .indexer()
        .wipe_user(alice, || async {
            Err(Error::Internal("records table locked".to_string()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
    // The index was still cleared.
    assert!(stack.index.is_empty().await);
}

#[tokio::test]
async fn test_version_mismatch_refused() {
    let stack = Stack::new();
    let other: Arc<dyn Embedder> = Arc::new(EmbeddingClient::new(
        Arc::new(MockEmbeddingBackend::new().with_model("other-model")),
        Arc::new(RateLimiter::unlimited()),
    ));

    let err = Indexer::checked(stack.index.clone(), stack.store.clone(), other.as_ref())
        .err()
        .expect("mismatch refused");
    assert!(matches!(err, Error::Config(_)));

    let stored = stack.index.version();
    let err = MemoryVectorIndex::open(other, Some(&stored))
        .err()
        .expect("mismatch refused");
    assert!(matches!(err, Error::Config(_)));

    assert!(Indexer::checked(
        stack.index.clone(),
        stack.store.clone(),
        stack.embedder().as_ref()
    )
    .is_ok());
}

#[tokio::test]
async fn test_add_refuses_an_indexed_record() {
    let stack = Stack::new();
    let alice = Uuid::new_v4();
    let m = stack
        .add_memory(alice, "Garage code", "The garage code is 1234")
        .await;
    let embed_calls = stack.backend.request_count();

    let mut edited = Document::from(m.clone());
    edited.content = "The garage code changed to 9876".to_string();
    let err = stack.index.add(&edited).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(stack.backend.request_count(), embed_calls);

    // The indexer replaces through delete-then-add.
    stack.indexer().index_one(&edited).await.unwrap();
    let indexed = stack
        .index
        .get_by_content_id(ContentType::Memory, m.id)
        .await
        .unwrap()
        .unwrap();
    assert!(indexed.content.contains("9876"));
    assert_eq!(stack.index.len().await, 1);
}
