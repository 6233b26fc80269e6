use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ChatMessage — the prompt unit
// ---------------------------------------------------------------------------

/// One message of a chat-completion prompt, as it appears on the wire.
///
/// The role string is kept as received: `user`, `assistant`, and `system`
/// are the common values, but unknown roles pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

/// Flatten a prompt to its canonical single-text form: `role: content`
/// lines joined with `\n`, in message order.
///
/// This text is the cache key input. Two prompts that flatten to the same
/// text embed identically and therefore reach the same cache decision.
pub fn flatten_prompt(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Completion wire shapes
// ---------------------------------------------------------------------------

/// One streaming chunk in the provider's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChunk {
    pub id: String,
    pub object: String,
    pub created: String,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub delta: ChunkDelta,
    pub index: u32,
    // Serialized as an explicit null on content chunks.
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl CompletionChunk {
    /// A content-bearing chunk with a null finish reason.
    pub fn content(
        id: impl Into<String>,
        created: impl Into<String>,
        model: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            object: "chat.completion.chunk".to_string(),
            created: created.into(),
            model: model.into(),
            choices: vec![ChunkChoice {
                delta: ChunkDelta {
                    content: Some(text.into()),
                },
                index: 0,
                finish_reason: None,
            }],
        }
    }

    /// The terminal chunk: empty delta, `finish_reason: "stop"`.
    pub fn stop(
        id: impl Into<String>,
        created: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            object: "chat.completion.chunk".to_string(),
            created: created.into(),
            model: model.into(),
            choices: vec![ChunkChoice {
                delta: ChunkDelta::default(),
                index: 0,
                finish_reason: Some("stop".to_string()),
            }],
        }
    }
}

/// Build the non-streaming completion body served on a cache hit.
pub fn completion_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{
            "message": {
                "content": content,
            }
        }]
    })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

pub type ReverbResult<T> = Result<T, ReverbError>;

/// Unified error type for the Reverb cache with variants covering all
/// collaborators.
#[derive(Debug, Error)]
pub enum ReverbError {
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("vector index error: {0}")]
    Index(String),
    #[error("content store error: {0}")]
    Store(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("upstream returned HTTP {status}")]
    UpstreamStatus {
        status: u16,
        body: serde_json::Value,
    },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("capture overflow: stream exceeded {max_bytes} bytes")]
    CaptureOverflow { max_bytes: usize },
    #[error("config error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Byte streams
// ---------------------------------------------------------------------------

/// A pinned, boxed async stream of raw response bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ReverbError>> + Send>>;

// ---------------------------------------------------------------------------
// Embeddings trait (implemented in reverb-embeddings)
// ---------------------------------------------------------------------------

/// Trait for embedding a flattened prompt into a fixed-dimension vector.
///
/// Implementations are deterministic modulo the model identifier: the same
/// text always embeds to the same vector.
#[async_trait]
pub trait Embeddings: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ReverbError>;
}

// ---------------------------------------------------------------------------
// VectorIndex trait (implemented in reverb-index)
// ---------------------------------------------------------------------------

/// A vector returned by a nearest-neighbor query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
}

/// The result of a nearest-neighbor query, ordered by descending score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub count: usize,
    pub matches: Vec<VectorMatch>,
}

/// A vector record to insert into the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
}

/// Trait for approximate nearest-neighbor storage.
///
/// Scores are normalized cosine similarity in [-1, 1]; larger is more
/// similar. `insert` is at-least-once and idempotent on id.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<QueryResult, ReverbError>;
    async fn insert(&self, records: Vec<VectorRecord>) -> Result<(), ReverbError>;
}

// ---------------------------------------------------------------------------
// ContentStore trait (implemented in reverb-store)
// ---------------------------------------------------------------------------

/// Durable mapping from an opaque entry id to completion text.
///
/// `put` is assumed durable before its acknowledgment returns. A vector in
/// the index whose id has no content here is a recoverable orphan.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<String>, ReverbError>;
    async fn put(&self, id: &str, content: &str) -> Result<(), ReverbError>;
}
