use std::sync::Arc;

use futures::StreamExt;
use reverb_core::{ByteStream, ReverbError};
use serde_json::Value;

use crate::backend::{lenient_body, ProviderBackend, ProviderRequest, ProviderResponse};

/// The request option that asks the cache to skip the similarity lookup.
/// Stripped before the body is forwarded upstream.
pub const NO_CACHE_FIELD: &str = "noCache";

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub api_key: String,
    pub base_url: String,
}

impl UpstreamConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Client for the upstream chat-completion endpoint.
///
/// Authorization uses the server-side credential only; end-client
/// Authorization headers are never forwarded. No retries.
pub struct UpstreamClient {
    config: UpstreamConfig,
    backend: Arc<dyn ProviderBackend>,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig, backend: Arc<dyn ProviderBackend>) -> Self {
        Self { config, backend }
    }

    fn build_request(&self, body: Value) -> ProviderRequest {
        ProviderRequest {
            url: format!("{}/chat/completions", self.config.base_url),
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", self.config.api_key),
                ),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: strip_no_cache(body),
        }
    }

    /// Issue a non-streaming completion.
    ///
    /// 2xx responses are returned as-is for verbatim relay. 4xx responses
    /// surface as [`ReverbError::UpstreamStatus`] so the caller can forward
    /// status and body unchanged; 5xx maps to a 502-class error.
    pub async fn complete(&self, body: Value) -> Result<ProviderResponse, ReverbError> {
        let request = self.build_request(body);
        let response = self.backend.send(request).await?;
        match response.status {
            200..=299 => Ok(response),
            400..=499 => Err(ReverbError::UpstreamStatus {
                status: response.status,
                body: response.body,
            }),
            status => Err(ReverbError::Upstream(format!(
                "upstream returned HTTP {status}"
            ))),
        }
    }

    /// Open a streaming completion and return the raw SSE byte stream.
    ///
    /// Error statuses are detected before any bytes are handed to the
    /// caller; their bodies are collected so 4xx can be relayed verbatim.
    pub async fn complete_stream(&self, body: Value) -> Result<ByteStream, ReverbError> {
        let request = self.build_request(body);
        let response = self.backend.send_stream(request).await?;
        match response.status {
            200..=299 => Ok(response.stream),
            400..=499 => {
                let body = collect_json_body(response.stream).await;
                Err(ReverbError::UpstreamStatus {
                    status: response.status,
                    body,
                })
            }
            status => {
                // Drain so the connection can be reused; the body is not
                // relayed for 5xx.
                let _ = collect_json_body(response.stream).await;
                Err(ReverbError::Upstream(format!(
                    "upstream returned HTTP {status}"
                )))
            }
        }
    }
}

/// Remove the cache-control hint before forwarding; everything else in the
/// client body passes through unmodified.
fn strip_no_cache(mut body: Value) -> Value {
    if let Some(obj) = body.as_object_mut() {
        obj.remove(NO_CACHE_FIELD);
    }
    body
}

async fn collect_json_body(mut stream: ByteStream) -> Value {
    let mut bytes = Vec::new();
    while let Some(Ok(chunk)) = stream.next().await {
        bytes.extend_from_slice(&chunk);
    }
    lenient_body(&String::from_utf8_lossy(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_no_cache_removes_only_the_hint() {
        let body = serde_json::json!({
            "model": "gpt-4",
            "noCache": true,
            "messages": [],
        });
        let stripped = strip_no_cache(body);
        assert!(stripped.get(NO_CACHE_FIELD).is_none());
        assert_eq!(stripped["model"], "gpt-4");
        assert!(stripped["messages"].is_array());
    }

    #[test]
    fn strip_no_cache_on_non_object_is_identity() {
        let body = serde_json::json!([1, 2, 3]);
        assert_eq!(strip_no_cache(body.clone()), body);
    }
}
