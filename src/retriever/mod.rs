// Retriever module
// Embeds a question and looks up its nearest chunks in the vector index


use std::sync::Arc;

use tracing::{debug, error};

use crate::database::{RetrievalResult, VectorIndex};
use crate::embeddings::Embedder;
use crate::{KbError, Result};

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Find the `k` chunks closest to `question`, best first
    ///
    /// # Arguments
    /// * `question` - Free-form question text
    /// * `k` - Maximum number of results
    ///
    /// # Returns
    /// * `Result<Vec<RetrievalResult>>` - Empty when nothing has been indexed
    #[inline]
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        debug!("Retrieving {} chunks for question: {}", k, question);

        let query_vector = self.embedder.embed(question).map_err(|e| {
            error!("Failed to embed question: {}", e);
            KbError::Retrieval(format!("Failed to embed question: {}", e))
        })?;

        let results = self.index.query(&query_vector, k).await.map_err(|e| {
            error!("Vector index query failed: {}", e);
            KbError::Retrieval(format!(
                "Vector index query failed ({}); rebuild the index if the embedding model changed",
                e
            ))
        })?;

        let model = self.embedder.model_name();
        if let Some(stale) = results.iter().find(|r| r.embedding_model != model) {
            return Err(KbError::Retrieval(format!(
                "Index was built with embedding model '{}' but queries use '{}'; rebuild the index",
                stale.embedding_model, model
            )));
        }

        debug!("Retrieved {} chunks", results.len());
        Ok(results)
    }
}
