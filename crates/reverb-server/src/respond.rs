use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use regex::Regex;
use reverb_core::{completion_body, ByteStream, CompletionChunk, ReverbError};
use serde_json::Value;
use uuid::Uuid;

/// The terminal SSE frame.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

fn token_re() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    // A token is a run of non-whitespace with its trailing whitespace
    // attached, so concatenating tokens reproduces the text exactly.
    TOKEN_RE.get_or_init(|| Regex::new(r"\S+\s*").unwrap())
}

/// Split cached content into the chunks a synthesized stream replays.
pub fn tokenize(content: &str) -> Vec<&str> {
    token_re().find_iter(content).map(|m| m.as_str()).collect()
}

fn sse_headers() -> [(header::HeaderName, &'static str); 4] {
    [
        (header::CONTENT_TYPE, "text/event-stream"),
        (header::CACHE_CONTROL, "no-cache"),
        (header::CONNECTION, "keep-alive"),
        (header::TRANSFER_ENCODING, "chunked"),
    ]
}

/// Wrap one JSON payload as an SSE message.
fn frame(payload: &Value) -> Bytes {
    Bytes::from(format!("data: {payload}\n\n"))
}

/// Relay a live upstream SSE stream to the client as-is.
pub fn sse_passthrough(live: ByteStream) -> Response {
    (sse_headers(), Body::from_stream(live)).into_response()
}

/// Synthesize a streaming response from cached content.
///
/// One chunk per `\S+\s*` token, a fresh id for the whole response, then a
/// terminal stop chunk and `[DONE]`. Content passes through serde exactly
/// once, so escapes inside the cached text are never doubled.
pub fn stream_hit(content: &str, model: &str) -> Response {
    let id = format!("chatcmpl-{}", Uuid::new_v4());
    let created = Utc::now().to_rfc3339();

    let mut frames: Vec<Result<Bytes, ReverbError>> = Vec::new();
    for token in tokenize(content) {
        let chunk = CompletionChunk::content(&id, &created, model, token);
        frames.push(Ok(frame(
            &serde_json::to_value(&chunk).unwrap_or_default(),
        )));
    }
    let stop = CompletionChunk::stop(&id, &created, model);
    frames.push(Ok(frame(&serde_json::to_value(&stop).unwrap_or_default())));
    frames.push(Ok(Bytes::from_static(DONE_FRAME.as_bytes())));

    (
        sse_headers(),
        Body::from_stream(futures::stream::iter(frames)),
    )
        .into_response()
}

/// Serve a non-streaming cache hit in the provider's response shape.
pub fn json_hit(content: &str) -> Response {
    (StatusCode::OK, Json(completion_body(content))).into_response()
}

/// Relay an upstream response body verbatim with its original status.
pub fn forward_upstream(status: u16, body: Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(body)).into_response()
}

/// An OpenAI-style error response.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    let kind = if status.is_client_error() {
        "invalid_request_error"
    } else {
        "upstream_error"
    };
    let body = serde_json::json!({
        "error": {
            "message": message,
            "type": kind,
        }
    });
    (status, Json(body)).into_response()
}
