//! Integration tests for keyword allocation
//!
//! Covers the base-62 sequence pipeline end-to-end: durable counter,
//! advisory availability check, explicit keyword validation, and the
//! guarantee that concurrent allocations never hand out the same keyword.

use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

use tautan::keyword::{KeywordAllocator, KeywordError};
use tautan::storage::{SqliteStorage, Storage};

async fn create_storage(dir: &TempDir) -> Arc<dyn Storage> {
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let storage = SqliteStorage::new(&url, 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

#[tokio::test]
async fn sequence_counter_is_monotonic() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;

    let first = storage.next_keyword_id().await.unwrap();
    let second = storage.next_keyword_id().await.unwrap();
    let third = storage.next_keyword_id().await.unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 2);
    assert_eq!(third, 3);
}

#[tokio::test]
async fn allocation_skips_taken_keywords() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;

    // "1" is what the first sequence value encodes to
    storage
        .create_link("1", "https://example.com", "", None)
        .await
        .unwrap();

    let allocator = KeywordAllocator::new(Arc::clone(&storage));
    let keyword = allocator.allocate_random().await.unwrap();

    assert_eq!(keyword, "2");
}

#[tokio::test]
async fn concurrent_allocation_yields_distinct_keywords() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;
    let allocator = Arc::new(KeywordAllocator::new(Arc::clone(&storage)));

    let mut handles = vec![];
    for _ in 0..100 {
        let allocator = Arc::clone(&allocator);
        let storage = Arc::clone(&storage);
        handles.push(tokio::spawn(async move {
            let keyword = allocator.allocate_random().await.unwrap();
            // The create must succeed: the storage constraint is what closes
            // the race, and no caller should ever observe a conflict.
            storage
                .create_link(&keyword, "https://example.com", "", None)
                .await
                .unwrap();
            keyword
        }));
    }

    let mut keywords = HashSet::new();
    for handle in handles {
        let keyword = handle.await.unwrap();
        assert!(keywords.insert(keyword.clone()), "duplicate keyword {keyword}");
    }

    assert_eq!(keywords.len(), 100);
}

#[tokio::test]
async fn validate_explicit_strips_invalid_characters() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;
    let allocator = KeywordAllocator::new(Arc::clone(&storage));

    let keyword = allocator.validate_explicit("ab cd!").await.unwrap();
    assert_eq!(keyword, "abcd!");

    let keyword = allocator.validate_explicit(" my-link.2024 ").await.unwrap();
    assert_eq!(keyword, "my-link.2024");
}

#[tokio::test]
async fn validate_explicit_rejects_empty_keyword() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;
    let allocator = KeywordAllocator::new(Arc::clone(&storage));

    let result = allocator.validate_explicit("  /+?#  ").await;
    assert!(matches!(result, Err(KeywordError::Empty)));
}

#[tokio::test]
async fn validate_explicit_rejects_taken_keyword() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;

    storage
        .create_link("docs", "https://example.com", "", None)
        .await
        .unwrap();

    let allocator = KeywordAllocator::new(Arc::clone(&storage));
    let result = allocator.validate_explicit("docs").await;
    assert!(matches!(result, Err(KeywordError::Taken)));
}

#[tokio::test]
async fn duplicate_create_surfaces_conflict() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;

    storage
        .create_link("dup", "https://example.com", "", None)
        .await
        .unwrap();

    let result = storage
        .create_link("dup", "https://other.example.com", "", None)
        .await;

    assert!(matches!(
        result,
        Err(tautan::storage::StorageError::Conflict)
    ));

    // The original mapping is untouched
    let link = storage.get_link("dup").await.unwrap().unwrap();
    assert_eq!(link.target, "https://example.com");
}

#[tokio::test]
async fn sequence_survives_reconnect() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("test.db").display());

    {
        let storage = SqliteStorage::new(&url, 5).await.unwrap();
        storage.init().await.unwrap();
        assert_eq!(storage.next_keyword_id().await.unwrap(), 1);
        assert_eq!(storage.next_keyword_id().await.unwrap(), 2);
    }

    // A fresh pool over the same file picks up where the counter left off;
    // init must not reset the seeded row.
    let storage = SqliteStorage::new(&url, 5).await.unwrap();
    storage.init().await.unwrap();
    assert_eq!(storage.next_keyword_id().await.unwrap(), 3);
}
