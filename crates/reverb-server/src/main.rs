use std::sync::Arc;

use reverb_core::ReverbError;
use reverb_embeddings::{OpenAiEmbeddings, OpenAiEmbeddingsConfig};
use reverb_index::{PineconeConfig, PineconeIndex};
use reverb_server::{router, AppState, ServerConfig};
use reverb_store::RedisContentStore;
use reverb_upstream::{HttpBackend, UpstreamClient, UpstreamConfig};

#[tokio::main]
async fn main() -> Result<(), ReverbError> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env()?;
    let backend = Arc::new(HttpBackend::new());

    let embeddings = Arc::new(OpenAiEmbeddings::new(
        OpenAiEmbeddingsConfig::new(&config.embeddings_api_key)
            .with_model(&config.embeddings_model)
            .with_base_url(&config.embeddings_base_url),
        backend.clone(),
    ));

    let mut pinecone = PineconeConfig::new(&config.pinecone_api_key, &config.pinecone_host);
    if let Some(ref namespace) = config.pinecone_namespace {
        pinecone = pinecone.with_namespace(namespace);
    }
    let index = Arc::new(PineconeIndex::new(pinecone));

    let store = Arc::new(RedisContentStore::new(
        &config.redis_url,
        config.redis_prefix.clone(),
    )?);

    let upstream = Arc::new(UpstreamClient::new(
        UpstreamConfig::new(&config.upstream_api_key).with_base_url(&config.upstream_base_url),
        backend,
    ));

    let state = Arc::new(AppState::new(
        embeddings,
        index,
        store,
        upstream,
        config.cache.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| ReverbError::Config(format!("failed to bind {}: {e}", config.bind_addr)))?;
    tracing::info!("reverb listening on {}", config.bind_addr);

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ReverbError::Config(format!("server error: {e}")))?;

    // In-flight cache writes get a bounded grace period before exit.
    tracing::info!("draining background writes");
    state
        .tasks
        .shutdown(state.settings.background_deadline)
        .await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
