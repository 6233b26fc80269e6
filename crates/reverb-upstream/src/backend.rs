use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use reverb_core::{ByteStream, ReverbError};
use serde_json::Value;
use tokio::sync::Mutex;

/// An outbound HTTP request to a provider endpoint.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// A buffered provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: Value,
}

/// A streaming provider response: status first, then raw body bytes.
pub struct ProviderStreamResponse {
    pub status: u16,
    pub stream: ByteStream,
}

#[async_trait]
pub trait ProviderBackend: Send + Sync {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ReverbError>;
    async fn send_stream(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderStreamResponse, ReverbError>;
}

/// Production backend using reqwest.
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderBackend for HttpBackend {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ReverbError> {
        let mut builder = self.client.post(&request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        builder = builder.json(&request.body);

        let response = builder
            .send()
            .await
            .map_err(|e| ReverbError::Upstream(format!("upstream POST failed: {e}")))?;

        // The status is captured before the body is interpreted: gateways
        // emit plain-text and HTML error pages, and the caller needs the
        // original status and body to classify those, not a parse error.
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ReverbError::Upstream(format!("failed to read response body: {e}")))?;

        Ok(ProviderResponse {
            status,
            body: lenient_body(&text),
        })
    }

    async fn send_stream(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderStreamResponse, ReverbError> {
        use futures::StreamExt;

        let mut builder = self.client.post(&request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        builder = builder.json(&request.body);

        let response = builder
            .send()
            .await
            .map_err(|e| ReverbError::Upstream(format!("could not open upstream stream: {e}")))?;

        let status = response.status().as_u16();
        let stream = response
            .bytes_stream()
            .map(|result| result.map_err(|e| ReverbError::Upstream(format!("upstream byte stream failed: {e}"))));

        Ok(ProviderStreamResponse {
            status,
            stream: Box::pin(stream),
        })
    }
}

/// Interpret a response body as JSON where possible. Non-JSON bodies are
/// preserved as a JSON string so they can still be relayed to the client.
pub(crate) fn lenient_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Test backend with queued responses and stream chunks.
///
/// Every request that reaches the backend is recorded, so tests can assert
/// on what was actually forwarded (url, headers, body).
pub struct FakeBackend {
    responses: Arc<Mutex<VecDeque<Result<ProviderResponse, ReverbError>>>>,
    streams: Arc<Mutex<VecDeque<QueuedStream>>>,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

struct QueuedStream {
    status: u16,
    chunks: Vec<Result<bytes::Bytes, ReverbError>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            streams: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push_response(&self, response: ProviderResponse) -> &Self {
        self.responses
            .try_lock()
            .expect("no contention during test setup")
            .push_back(Ok(response));
        self
    }

    pub fn push_error(&self, error: ReverbError) -> &Self {
        self.responses
            .try_lock()
            .expect("no contention during test setup")
            .push_back(Err(error));
        self
    }

    /// Queue a successful (HTTP 200) byte stream.
    pub fn push_stream_chunks(&self, chunks: Vec<bytes::Bytes>) -> &Self {
        self.push_stream(200, chunks.into_iter().map(Ok).collect())
    }

    /// Queue a stream with an explicit status and per-chunk results.
    pub fn push_stream(
        &self,
        status: u16,
        chunks: Vec<Result<bytes::Bytes, ReverbError>>,
    ) -> &Self {
        self.streams
            .try_lock()
            .expect("no contention during test setup")
            .push_back(QueuedStream { status, chunks });
        self
    }

    /// Requests observed so far, in arrival order.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderBackend for FakeBackend {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ReverbError> {
        self.requests.lock().await.push(request);
        let mut responses = self.responses.lock().await;
        responses
            .pop_front()
            .unwrap_or_else(|| Err(ReverbError::Upstream("no queued response in FakeBackend".to_string())))
    }

    async fn send_stream(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderStreamResponse, ReverbError> {
        self.requests.lock().await.push(request);
        let mut streams = self.streams.lock().await;
        let queued = streams.pop_front().unwrap_or(QueuedStream {
            status: 200,
            chunks: Vec::new(),
        });

        let stream = futures::stream::iter(queued.chunks);
        Ok(ProviderStreamResponse {
            status: queued.status,
            stream: Box::pin(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_body_passes_json_through() {
        let body = lenient_body("{\"error\":{\"message\":\"nope\"}}");
        assert_eq!(body["error"]["message"], "nope");
    }

    #[test]
    fn lenient_body_keeps_non_json_as_a_string() {
        let body = lenient_body("<html>502 Bad Gateway</html>");
        assert_eq!(body, Value::String("<html>502 Bad Gateway</html>".to_string()));
    }

    #[test]
    fn lenient_body_of_empty_is_null() {
        assert_eq!(lenient_body(""), Value::Null);
    }
}
