mod fake;
mod openai;

pub use fake::{FailingEmbeddings, FakeEmbeddings, ScriptedEmbeddings};
pub use openai::{OpenAiEmbeddings, OpenAiEmbeddingsConfig};

// Re-export the Embeddings trait from core (forward-declared there).
pub use reverb_core::Embeddings;
