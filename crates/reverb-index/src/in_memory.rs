use std::collections::HashMap;

use async_trait::async_trait;
use reverb_core::{QueryResult, ReverbError, VectorIndex, VectorMatch, VectorRecord};
use tokio::sync::RwLock;

/// In-memory vector index using cosine similarity.
///
/// Concurrency-safe through the RwLock; mainly used in tests and
/// single-process deployments.
pub struct InMemoryIndex {
    entries: RwLock<HashMap<String, Vec<f32>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Create an index pre-populated with records.
    pub async fn from_records(records: Vec<VectorRecord>) -> Self {
        let index = Self::new();
        // Insert on a fresh index cannot fail.
        let _ = index.insert(records).await;
        index
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<QueryResult, ReverbError> {
        let entries = self.entries.read().await;

        let mut scored: Vec<VectorMatch> = entries
            .iter()
            .map(|(id, values)| VectorMatch {
                id: id.clone(),
                score: cosine_similarity(vector, values),
            })
            .collect();

        // Sort by score descending
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(QueryResult {
            count: scored.len(),
            matches: scored,
        })
    }

    async fn insert(&self, records: Vec<VectorRecord>) -> Result<(), ReverbError> {
        let mut entries = self.entries.write().await;
        for record in records {
            entries.insert(record.id, record.values);
        }
        Ok(())
    }
}

/// Cosine similarity in a single pass; zero for degenerate or
/// mismatched-length inputs.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_lengths() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
