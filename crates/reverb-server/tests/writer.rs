use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reverb_core::{ContentStore, QueryResult, ReverbError, VectorIndex, VectorRecord};
use reverb_index::InMemoryIndex;
use reverb_server::writer::{commit_text, CacheWrite};
use reverb_store::InMemoryContentStore;

/// Index wrapper that checks, at insert time, that the content record for
/// the inserted id is already readable.
struct ContentCheckingIndex {
    inner: Arc<InMemoryIndex>,
    store: Arc<InMemoryContentStore>,
    content_was_present: Arc<AtomicBool>,
}

#[async_trait]
impl VectorIndex for ContentCheckingIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<QueryResult, ReverbError> {
        self.inner.query(vector, top_k).await
    }

    async fn insert(&self, records: Vec<VectorRecord>) -> Result<(), ReverbError> {
        for record in &records {
            let present = self
                .store
                .get(&record.id)
                .await?
                .map(|c| !c.is_empty())
                .unwrap_or(false);
            if !present {
                self.content_was_present.store(false, Ordering::SeqCst);
            }
        }
        self.inner.insert(records).await
    }
}

#[tokio::test]
async fn content_is_durable_before_the_vector_is_findable() {
    let inner = Arc::new(InMemoryIndex::new());
    let store = Arc::new(InMemoryContentStore::new());
    let content_was_present = Arc::new(AtomicBool::new(true));
    let index = Arc::new(ContentCheckingIndex {
        inner: inner.clone(),
        store: store.clone(),
        content_was_present: content_was_present.clone(),
    });

    commit_text(
        index,
        store,
        CacheWrite {
            vector: vec![1.0, 0.0],
            reuse_id: None,
        },
        "the completion".to_string(),
    )
    .await;

    assert!(content_was_present.load(Ordering::SeqCst));
    assert_eq!(inner.len().await, 1);
}

#[tokio::test]
async fn empty_text_is_never_committed() {
    let index = Arc::new(InMemoryIndex::new());
    let store = Arc::new(InMemoryContentStore::new());

    commit_text(
        index.clone(),
        store.clone(),
        CacheWrite {
            vector: vec![1.0, 0.0],
            reuse_id: None,
        },
        String::new(),
    )
    .await;

    assert_eq!(index.len().await, 0);
    assert_eq!(store.len().await, 0);
}

#[tokio::test]
async fn rebind_writes_content_without_a_second_vector() {
    let index = Arc::new(InMemoryIndex::new());
    let store = Arc::new(InMemoryContentStore::new());
    index
        .insert(vec![VectorRecord {
            id: "orphan".to_string(),
            values: vec![1.0, 0.0],
        }])
        .await
        .unwrap();

    commit_text(
        index.clone(),
        store.clone(),
        CacheWrite {
            vector: vec![1.0, 0.0],
            reuse_id: Some("orphan".to_string()),
        },
        "repaired".to_string(),
    )
    .await;

    assert_eq!(index.len().await, 1);
    assert_eq!(store.get("orphan").await.unwrap().as_deref(), Some("repaired"));
}

#[tokio::test]
async fn minted_ids_are_unique_per_commit() {
    let index = Arc::new(InMemoryIndex::new());
    let store = Arc::new(InMemoryContentStore::new());

    for _ in 0..2 {
        commit_text(
            index.clone(),
            store.clone(),
            CacheWrite {
                vector: vec![1.0, 0.0],
                reuse_id: None,
            },
            "same answer".to_string(),
        )
        .await;
    }

    assert_eq!(index.len().await, 2);
    assert_eq!(store.len().await, 2);
}
