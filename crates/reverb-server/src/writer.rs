use std::sync::Arc;

use reverb_core::{ContentStore, VectorIndex, VectorRecord};
use reverb_stream::{extract_content, CaptureHandle};
use uuid::Uuid;

/// What a background commit needs besides the completion text.
pub struct CacheWrite {
    /// The prompt embedding computed on the foreground path.
    pub vector: Vec<f32>,
    /// Orphan id to rebind instead of minting a new entry. Rebinding
    /// writes content only; the vector for this id already exists.
    pub reuse_id: Option<String>,
}

/// Join a capture and, if admissible, commit the extracted completion.
///
/// Admission requires the capture to have ended cleanly, the SSE payload
/// to parse, and the extracted text to be non-empty. Anything else is
/// discarded without affecting the already-delivered response.
pub async fn commit_capture(
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn ContentStore>,
    write: CacheWrite,
    capture: CaptureHandle,
) {
    let bytes = match capture.join().await.into_admissible() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("cache write discarded: {e}");
            return;
        }
    };

    let text = match extract_content(&bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("cache write discarded: {e}");
            return;
        }
    };

    commit_text(index, store, write, text).await;
}

/// Commit completion text: content first, then the vector.
///
/// The content write must be durable before the vector becomes findable —
/// an index entry without content is the one inconsistency clients can
/// observe, while unreferenced content is invisible.
pub async fn commit_text(
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn ContentStore>,
    write: CacheWrite,
    text: String,
) {
    if text.is_empty() {
        tracing::debug!("cache write discarded: empty completion");
        return;
    }

    let rebinding = write.reuse_id.is_some();
    let id = write
        .reuse_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Err(e) = store.put(&id, &text).await {
        tracing::warn!("content write failed, entry discarded: {e}");
        return;
    }

    if rebinding {
        tracing::info!("rebound orphan entry {id} ({} bytes)", text.len());
        return;
    }

    if let Err(e) = index
        .insert(vec![VectorRecord {
            id: id.clone(),
            values: write.vector,
        }])
        .await
    {
        tracing::warn!("vector insert failed for {id}: {e}");
        return;
    }

    tracing::info!("cached completion {id} ({} bytes)", text.len());
}
