use std::sync::Arc;

use async_trait::async_trait;
use reverb_core::{Embeddings, ReverbError};
use reverb_upstream::{ProviderBackend, ProviderRequest};
use serde_json::json;

pub struct OpenAiEmbeddingsConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl OpenAiEmbeddingsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Embeddings via the OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddings {
    config: OpenAiEmbeddingsConfig,
    backend: Arc<dyn ProviderBackend>,
}

impl OpenAiEmbeddings {
    pub fn new(config: OpenAiEmbeddingsConfig, backend: Arc<dyn ProviderBackend>) -> Self {
        Self { config, backend }
    }

    fn build_request(&self, input: &str) -> ProviderRequest {
        ProviderRequest {
            url: format!("{}/embeddings", self.config.base_url),
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", self.config.api_key),
                ),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: json!({
                "model": self.config.model,
                "input": input,
            }),
        }
    }

    fn parse_response(&self, body: &serde_json::Value) -> Result<Vec<f32>, ReverbError> {
        let embedding = body["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| {
                ReverbError::Embedding("missing 'data[0].embedding' in response".to_string())
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        Ok(embedding)
    }
}

#[async_trait]
impl Embeddings for OpenAiEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ReverbError> {
        let request = self.build_request(text);
        let response = self
            .backend
            .send(request)
            .await
            .map_err(|e| ReverbError::Embedding(e.to_string()))?;

        if response.status != 200 {
            return Err(ReverbError::Embedding(format!(
                "embeddings API error ({}): {}",
                response.status, response.body
            )));
        }

        self.parse_response(&response.body)
    }
}
