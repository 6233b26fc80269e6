use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use reverb_core::{ContentStore, Embeddings, VectorIndex};
use reverb_upstream::UpstreamClient;

pub mod config;
pub mod handler;
pub mod respond;
pub mod tasks;
pub mod writer;

pub use config::{CacheSettings, ServerConfig};
pub use tasks::BackgroundTasks;

/// Shared state behind the HTTP surface: the four collaborators, the cache
/// knobs, and the background write registry.
pub struct AppState {
    pub embeddings: Arc<dyn Embeddings>,
    pub index: Arc<dyn VectorIndex>,
    pub store: Arc<dyn ContentStore>,
    pub upstream: Arc<UpstreamClient>,
    pub settings: CacheSettings,
    pub tasks: BackgroundTasks,
}

impl AppState {
    pub fn new(
        embeddings: Arc<dyn Embeddings>,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn ContentStore>,
        upstream: Arc<UpstreamClient>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            embeddings,
            index,
            store,
            upstream,
            settings,
            tasks: BackgroundTasks::new(),
        }
    }
}

/// Build the router for the cache's single endpoint.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat/completions", post(handler::chat_completions))
        .with_state(state)
}
