use async_trait::async_trait;
use reverb_core::{QueryResult, ReverbError, VectorIndex, VectorMatch, VectorRecord};
use serde_json::Value;

// ---------------------------------------------------------------------------
// PineconeConfig
// ---------------------------------------------------------------------------

/// Connection settings for a Pinecone index.
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    /// Index host, as shown in the Pinecone console
    /// (`https://<index>-<project>.svc.<region>.pinecone.io`).
    pub host: String,
    /// Namespace to scope every query and upsert to, when set.
    pub namespace: Option<String>,
}

impl PineconeConfig {
    pub fn new(api_key: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: host.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

// ---------------------------------------------------------------------------
// PineconeIndex
// ---------------------------------------------------------------------------

/// A [`VectorIndex`] backed by the Pinecone REST API.
///
/// Queries POST `/query` with `{ vector, topK }`; inserts POST
/// `/vectors/upsert` with `{ vectors: [{id, values}] }`. Upsert gives the
/// at-least-once, idempotent-on-id insert the cache relies on. The index
/// must be configured for cosine similarity; scores come back normalized.
pub struct PineconeIndex {
    config: PineconeConfig,
    client: reqwest::Client,
}

impl PineconeIndex {
    pub fn new(config: PineconeConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &PineconeConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        match self.config.host.strip_suffix('/') {
            Some(host) => format!("{host}{path}"),
            None => format!("{}{path}", self.config.host),
        }
    }

    /// Assemble a request body, adding the configured namespace if any.
    fn payload(&self, mut fields: serde_json::Map<String, Value>) -> Value {
        if let Some(ns) = &self.config.namespace {
            fields.insert("namespace".to_string(), Value::String(ns.clone()));
        }
        Value::Object(fields)
    }

    async fn call(&self, path: &str, payload: Value) -> Result<Value, ReverbError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .header("Api-Key", &self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ReverbError::Index(format!("index endpoint unreachable: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ReverbError::Index(format!("index response could not be read: {e}")))?;

        if !status.is_success() {
            return Err(ReverbError::Index(format!(
                "index rejected {path} ({status}): {body}"
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| ReverbError::Index(format!("index sent invalid JSON: {e}")))
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<QueryResult, ReverbError> {
        let mut fields = serde_json::Map::new();
        fields.insert("vector".to_string(), serde_json::json!(vector));
        fields.insert("topK".to_string(), Value::from(top_k));
        fields.insert("includeValues".to_string(), Value::Bool(false));

        let response = self.call("/query", self.payload(fields)).await?;

        let matches: Vec<VectorMatch> = match response["matches"].as_array() {
            Some(raw) => raw
                .iter()
                .map(|m| VectorMatch {
                    id: m["id"].as_str().unwrap_or_default().to_string(),
                    score: m["score"].as_f64().unwrap_or_default() as f32,
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(QueryResult {
            count: matches.len(),
            matches,
        })
    }

    async fn insert(&self, records: Vec<VectorRecord>) -> Result<(), ReverbError> {
        if records.is_empty() {
            return Ok(());
        }

        let vectors: Vec<Value> = records
            .iter()
            .map(|r| serde_json::json!({"id": r.id, "values": r.values}))
            .collect();

        let mut fields = serde_json::Map::new();
        fields.insert("vectors".to_string(), Value::Array(vectors));

        self.call("/vectors/upsert", self.payload(fields)).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_host_and_path() {
        let index = PineconeIndex::new(PineconeConfig::new("k", "https://idx.test"));
        assert_eq!(index.endpoint("/query"), "https://idx.test/query");

        let slashed = PineconeIndex::new(PineconeConfig::new("k", "https://idx.test/"));
        assert_eq!(slashed.endpoint("/query"), "https://idx.test/query");
    }

    #[test]
    fn payload_carries_namespace_when_configured() {
        let index =
            PineconeIndex::new(PineconeConfig::new("k", "https://idx.test").with_namespace("prod"));
        let mut fields = serde_json::Map::new();
        fields.insert("topK".to_string(), Value::from(1));
        let body = index.payload(fields);
        assert_eq!(body["namespace"], "prod");
        assert_eq!(body["topK"], 1);
    }

    #[test]
    fn payload_has_no_namespace_by_default() {
        let index = PineconeIndex::new(PineconeConfig::new("k", "https://idx.test"));
        let body = index.payload(serde_json::Map::new());
        assert!(body.get("namespace").is_none());
    }
}
