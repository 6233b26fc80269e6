use std::env;
use std::str::FromStr;
use std::time::Duration;

use reverb_core::ReverbError;

/// Cache behavior knobs, shared by the handler and the background writer.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Minimum cosine similarity for a HIT. A score exactly equal to the
    /// threshold is a hit.
    pub match_threshold: f32,
    /// Capture buffer cap; beyond it the background write is abandoned.
    pub capture_max_bytes: usize,
    /// Upper bound on background work after the client response finishes.
    pub background_deadline: Duration,
    /// Model name echoed in synthesized chunks when the request omits one.
    pub default_model: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            match_threshold: 0.9,
            capture_max_bytes: 1_048_576,
            background_deadline: Duration::from_millis(120_000),
            default_model: "gpt-4o-mini".to_string(),
        }
    }
}

impl CacheSettings {
    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn with_capture_max_bytes(mut self, max: usize) -> Self {
        self.capture_max_bytes = max;
        self
    }

    pub fn with_background_deadline(mut self, deadline: Duration) -> Self {
        self.background_deadline = deadline;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

/// Full deployment configuration for the `reverb` binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub upstream_base_url: String,
    pub upstream_api_key: String,
    pub embeddings_base_url: String,
    pub embeddings_api_key: String,
    pub embeddings_model: String,
    pub pinecone_host: String,
    pub pinecone_api_key: String,
    pub pinecone_namespace: Option<String>,
    pub redis_url: String,
    pub redis_prefix: Option<String>,
    pub cache: CacheSettings,
}

impl ServerConfig {
    /// Read configuration from `REVERB_*` environment variables.
    pub fn from_env() -> Result<Self, ReverbError> {
        let upstream_api_key = required("REVERB_UPSTREAM_API_KEY")?;

        let mut cache = CacheSettings::default();
        if let Some(threshold) = parse_var::<f32>("REVERB_MATCH_THRESHOLD")? {
            cache = cache.with_match_threshold(threshold);
        }
        if let Some(max) = parse_var::<usize>("REVERB_CAPTURE_MAX_BYTES")? {
            cache = cache.with_capture_max_bytes(max);
        }
        if let Some(ms) = parse_var::<u64>("REVERB_BACKGROUND_DEADLINE_MS")? {
            cache = cache.with_background_deadline(Duration::from_millis(ms));
        }
        if let Ok(model) = env::var("REVERB_DEFAULT_MODEL") {
            cache = cache.with_default_model(model);
        }

        let upstream_base_url = optional(
            "REVERB_UPSTREAM_BASE_URL",
            "https://api.openai.com/v1",
        );

        Ok(Self {
            bind_addr: optional("REVERB_BIND_ADDR", "127.0.0.1:8787"),
            embeddings_base_url: env::var("REVERB_EMBEDDINGS_BASE_URL")
                .unwrap_or_else(|_| upstream_base_url.clone()),
            // The embedder shares the upstream credential unless given its own.
            embeddings_api_key: env::var("REVERB_EMBEDDINGS_API_KEY")
                .unwrap_or_else(|_| upstream_api_key.clone()),
            embeddings_model: optional("REVERB_EMBEDDINGS_MODEL", "text-embedding-3-small"),
            pinecone_host: required("REVERB_PINECONE_HOST")?,
            pinecone_api_key: required("REVERB_PINECONE_API_KEY")?,
            pinecone_namespace: env::var("REVERB_PINECONE_NAMESPACE").ok(),
            redis_url: optional("REVERB_REDIS_URL", "redis://127.0.0.1/"),
            redis_prefix: env::var("REVERB_REDIS_PREFIX").ok(),
            upstream_base_url,
            upstream_api_key,
            cache,
        })
    }
}

fn required(name: &str) -> Result<String, ReverbError> {
    env::var(name).map_err(|_| ReverbError::Config(format!("{name} must be set")))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, ReverbError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ReverbError::Config(format!("{name} has invalid value {raw:?}"))),
        Err(_) => Ok(None),
    }
}
