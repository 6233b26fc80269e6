mod in_memory;
mod pinecone;

pub use in_memory::InMemoryIndex;
pub use pinecone::{PineconeConfig, PineconeIndex};

// Re-export the index contract from core (forward-declared there).
pub use reverb_core::{QueryResult, VectorIndex, VectorMatch, VectorRecord};
