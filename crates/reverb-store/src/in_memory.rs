use std::collections::HashMap;

use async_trait::async_trait;
use reverb_core::{ContentStore, ReverbError};
use tokio::sync::RwLock;

/// In-memory content store, for tests and single-process deployments.
pub struct InMemoryContentStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn get(&self, id: &str) -> Result<Option<String>, ReverbError> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn put(&self, id: &str, content: &str) -> Result<(), ReverbError> {
        self.entries
            .write()
            .await
            .insert(id.to_string(), content.to_string());
        Ok(())
    }
}

/// A content store that fails every operation, for exercising the degrade
/// and discard paths.
pub struct FailingContentStore;

#[async_trait]
impl ContentStore for FailingContentStore {
    async fn get(&self, _id: &str) -> Result<Option<String>, ReverbError> {
        Err(ReverbError::Store("store unavailable".to_string()))
    }

    async fn put(&self, _id: &str, _content: &str) -> Result<(), ReverbError> {
        Err(ReverbError::Store("store unavailable".to_string()))
    }
}
