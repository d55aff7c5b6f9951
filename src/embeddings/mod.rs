// Embeddings module
// Content chunking and the embedding collaborator used for both indexing and querying

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, DocumentChunk, SourceDocument, chunk_documents, split_text};
pub use ollama::OllamaClient;

/// Turns text into fixed-length vectors.
///
/// Implementations must be deterministic and keep one dimension for the
/// lifetime of the process; the same embedder has to be used for indexing
/// and for querying or distances are meaningless.
pub trait Embedder: Send + Sync {
    /// Identifier of the embedding model, stored alongside indexed records
    fn model_name(&self) -> &str;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Embed many texts, preserving input order
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}
