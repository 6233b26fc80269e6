pub mod backend;
pub use backend::{
    FakeBackend, HttpBackend, ProviderBackend, ProviderRequest, ProviderResponse,
    ProviderStreamResponse,
};

mod client;
pub use client::{UpstreamClient, UpstreamConfig, NO_CACHE_FIELD};
