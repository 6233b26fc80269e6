mod sse;
mod tee;

pub use sse::{extract_content, SseEvent, SseParser};
pub use tee::{CaptureHandle, CaptureOutcome, StreamTee, TeeConfig};
