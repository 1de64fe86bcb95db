// Embeddings: record chunking and the embedding provider seam

pub mod chunking;
pub mod ollama;

use async_trait::async_trait;

use crate::http::ProviderError;

pub use chunking::{Chunk, ChunkMetadata, ChunkType, chunk_record, chunk_records};
pub use ollama::OllamaClient;

/// Turns text into fixed-dimension vectors
///
/// Implementations must return exactly one vector per input text, in input
/// order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Length of every vector this provider produces
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}
