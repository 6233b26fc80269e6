use std::collections::HashMap;

use async_trait::async_trait;
use reverb_core::{Embeddings, ReverbError};

/// Test embedder with no model behind it: the vector is a unit-length
/// byte histogram of the input, so identical texts always embed
/// identically and nearby texts land close together.
pub struct FakeEmbeddings {
    dims: usize,
}

impl FakeEmbeddings {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for FakeEmbeddings {
    fn default() -> Self {
        Self::new(4)
    }
}

#[async_trait]
impl Embeddings for FakeEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ReverbError> {
        Ok(histogram_embedding(text, self.dims))
    }
}

/// Embeddings scripted per exact input text, for tests that need precise
/// similarity scores. Unscripted texts fall back to the histogram vector.
pub struct ScriptedEmbeddings {
    vectors: HashMap<String, Vec<f32>>,
    fallback_dims: usize,
}

impl ScriptedEmbeddings {
    pub fn new(fallback_dims: usize) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback_dims,
        }
    }

    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }
}

#[async_trait]
impl Embeddings for ScriptedEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ReverbError> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| histogram_embedding(text, self.fallback_dims)))
    }
}

/// An embedder that always fails, for exercising the 502 path.
pub struct FailingEmbeddings;

#[async_trait]
impl Embeddings for FailingEmbeddings {
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, ReverbError> {
        Err(ReverbError::Embedding("embedder unavailable".to_string()))
    }
}

/// Bucket the input's bytes into `dims` accumulators and scale the result
/// to unit length. Folding the byte position into the bucket choice keeps
/// anagrams from embedding identically.
fn histogram_embedding(text: &str, dims: usize) -> Vec<f32> {
    let mut buckets = vec![0.0f32; dims];
    for (position, byte) in text.bytes().enumerate() {
        buckets[(byte as usize + position) % dims] += f32::from(byte);
    }

    let norm = buckets.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return buckets;
    }
    buckets.into_iter().map(|x| x / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_is_deterministic() {
        let embeddings = FakeEmbeddings::new(4);
        let a = embeddings.embed_query("hello world").await.unwrap();
        let b = embeddings.embed_query("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn fake_produces_unit_vectors() {
        let embeddings = FakeEmbeddings::new(8);
        let v = embeddings.embed_query("some text").await.unwrap();
        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn scripted_returns_the_scripted_vector() {
        let embeddings =
            ScriptedEmbeddings::new(4).with_vector("user: hi", vec![1.0, 0.0, 0.0, 0.0]);
        let v = embeddings.embed_query("user: hi").await.unwrap();
        assert_eq!(v, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn scripted_falls_back_for_unknown_text() {
        let embeddings = ScriptedEmbeddings::new(4);
        let v = embeddings.embed_query("unscripted").await.unwrap();
        assert_eq!(v.len(), 4);
    }
}
