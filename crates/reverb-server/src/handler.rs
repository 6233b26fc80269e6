use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use reverb_core::{flatten_prompt, ChatMessage, ReverbError};
use reverb_stream::{StreamTee, TeeConfig};
use serde_json::Value;

use crate::respond;
use crate::writer::{self, CacheWrite};
use crate::AppState;

/// How a request proceeds after the similarity lookup.
enum Decision {
    /// Serve stored content; no upstream call.
    Hit { content: String },
    /// Call upstream. `reuse_id` carries an orphan id to rebind when the
    /// index matched but the content record was missing.
    Miss { reuse_id: Option<String> },
}

/// `POST /chat/completions` — the cache front door.
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return respond::error_response(
                StatusCode::BAD_REQUEST,
                &format!("invalid JSON body: {e}"),
            )
        }
    };

    let messages: Vec<ChatMessage> = match payload
        .get("messages")
        .map(|m| serde_json::from_value(m.clone()))
    {
        Some(Ok(messages)) => messages,
        _ => {
            return respond::error_response(
                StatusCode::BAD_REQUEST,
                "missing or malformed 'messages'",
            )
        }
    };

    let streaming = payload["stream"].as_bool().unwrap_or(false);
    let no_cache = payload["noCache"].as_bool().unwrap_or(false);
    let model = payload["model"]
        .as_str()
        .unwrap_or(&state.settings.default_model)
        .to_string();

    let prompt = flatten_prompt(&messages);

    let vector = match state.embeddings.embed_query(&prompt).await {
        Ok(vector) => vector,
        Err(e) => {
            tracing::warn!("embedding failed: {e}");
            return respond::error_response(StatusCode::BAD_GATEWAY, &e.to_string());
        }
    };

    let decision = if no_cache {
        // Bypass: the index is not consulted, but the fresh answer is
        // still written.
        Decision::Miss { reuse_id: None }
    } else {
        match decide(&state, &vector).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!("index query failed: {e}");
                return respond::error_response(StatusCode::BAD_GATEWAY, &e.to_string());
            }
        }
    };

    match decision {
        Decision::Hit { content } => {
            tracing::debug!("cache hit, {} bytes", content.len());
            if streaming {
                respond::stream_hit(&content, &model)
            } else {
                respond::json_hit(&content)
            }
        }
        Decision::Miss { reuse_id } => {
            tracing::debug!(
                "cache miss (noCache={no_cache}, rebind={})",
                reuse_id.is_some()
            );
            let write = CacheWrite { vector, reuse_id };
            if streaming {
                miss_streaming(&state, payload, write).await
            } else {
                miss_buffered(&state, payload, write).await
            }
        }
    }
}

/// Query the index and classify the outcome. Misses reuse the vector that
/// was already computed; an index match without content degrades to a miss
/// that rebinds the orphan id.
async fn decide(state: &AppState, vector: &[f32]) -> Result<Decision, ReverbError> {
    let result = state.index.query(vector, 1).await?;

    let top = match result.matches.first() {
        Some(top) if result.count > 0 => top.clone(),
        _ => return Ok(Decision::Miss { reuse_id: None }),
    };

    // Strictly less-than: a score equal to the threshold is a hit.
    if top.score < state.settings.match_threshold {
        return Ok(Decision::Miss { reuse_id: None });
    }

    match state.store.get(&top.id).await {
        Ok(Some(content)) => Ok(Decision::Hit { content }),
        Ok(None) => {
            tracing::warn!("orphan vector {}: no content record", top.id);
            Ok(Decision::Miss {
                reuse_id: Some(top.id),
            })
        }
        Err(e) => {
            // A store outage reads as a miss; the rebind may repair the
            // entry once the store is back.
            tracing::warn!("content fetch for {} failed: {e}", top.id);
            Ok(Decision::Miss {
                reuse_id: Some(top.id),
            })
        }
    }
}

/// Non-streaming miss: relay the upstream body verbatim and persist the
/// extracted completion concurrently.
async fn miss_buffered(state: &Arc<AppState>, payload: Value, write: CacheWrite) -> Response {
    let response = match state.upstream.complete(payload).await {
        Ok(response) => response,
        Err(ReverbError::UpstreamStatus { status, body }) => {
            return respond::forward_upstream(status, body)
        }
        Err(e) => {
            tracing::warn!("upstream call failed: {e}");
            return respond::error_response(StatusCode::BAD_GATEWAY, &e.to_string());
        }
    };

    let content = response.body["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();

    let index = state.index.clone();
    let store = state.store.clone();
    state
        .tasks
        .spawn(async move { writer::commit_text(index, store, write, content).await });

    respond::forward_upstream(response.status, response.body)
}

/// Streaming miss: tee the upstream stream, relay the live side, and hand
/// the capture to the background writer.
async fn miss_streaming(state: &Arc<AppState>, payload: Value, write: CacheWrite) -> Response {
    let upstream = match state.upstream.complete_stream(payload).await {
        Ok(stream) => stream,
        Err(ReverbError::UpstreamStatus { status, body }) => {
            return respond::forward_upstream(status, body)
        }
        Err(e) => {
            tracing::warn!("upstream stream failed to open: {e}");
            return respond::error_response(StatusCode::BAD_GATEWAY, &e.to_string());
        }
    };

    let tee_config = TeeConfig::default()
        .with_capture_max_bytes(state.settings.capture_max_bytes)
        .with_deadline(state.settings.background_deadline);
    let (live, capture) = StreamTee::split(upstream, tee_config);

    let index = state.index.clone();
    let store = state.store.clone();
    state
        .tasks
        .spawn(async move { writer::commit_capture(index, store, write, capture).await });

    respond::sse_passthrough(live)
}
