mod in_memory;
mod redis_store;

pub use in_memory::{FailingContentStore, InMemoryContentStore};
pub use redis_store::RedisContentStore;

// Re-export the store contract from core (forward-declared there).
pub use reverb_core::ContentStore;
