// Indexer module
// Loads text documents, embeds their chunks and rebuilds the vector index


use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::database::{IndexedRecord, VectorIndex};
use crate::embeddings::{ChunkingConfig, Embedder, SourceDocument, chunk_documents};
use crate::{KbError, Result};

/// Summary of one rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    /// `None` when nothing was indexed
    pub embedding_dimension: Option<usize>,
}

/// Read every `.txt` file directly inside `dir`, ordered by file name
///
/// # Arguments
/// * `dir` - Directory holding the knowledge base files
///
/// # Returns
/// * `Result<Vec<SourceDocument>>` - Documents named by file name
#[inline]
pub async fn load_text_documents(dir: &Path) -> Result<Vec<SourceDocument>> {
    debug!("Loading documents from {}", dir.display());

    let mut entries = fs::read_dir(dir).await.map_err(|e| {
        KbError::Indexing(format!(
            "Failed to read document directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_text = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if is_text && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        let text = fs::read_to_string(&path).await.map_err(|e| {
            KbError::Indexing(format!("Failed to read {}: {}", path.display(), e))
        })?;
        documents.push(SourceDocument::new(name, text));
    }

    info!(
        "Loaded {} documents from {}",
        documents.len(),
        dir.display()
    );
    Ok(documents)
}

/// Builds the vector index from source documents
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
}

impl Indexer {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            chunking,
        }
    }

    /// Replace the index contents with chunks of `documents`.
    ///
    /// Fails with `KbError::Indexing` if any chunk cannot be embedded or the
    /// index cannot be written. Nothing is written unless every chunk was
    /// embedded.
    #[inline]
    pub async fn index_documents(&self, documents: &[SourceDocument]) -> Result<IndexReport> {
        let chunks = chunk_documents(documents, &self.chunking);
        info!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        if chunks.is_empty() {
            warn!("No content to index, clearing vector index");
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&texts).map_err(|e| {
                error!("Failed to embed chunks: {}", e);
                KbError::Indexing(format!("Failed to embed chunks: {}", e))
            })?
        };

        if vectors.len() != chunks.len() {
            return Err(KbError::Indexing(format!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let embedding_dimension = vectors.first().map(Vec::len);
        let model = self.embedder.model_name();
        let records: Vec<IndexedRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedRecord::new(chunk, vector, model))
            .collect();
        let chunk_count = records.len();

        self.index.clear_and_rebuild(records).await.map_err(|e| {
            error!("Failed to rebuild vector index: {}", e);
            KbError::Indexing(format!("Failed to rebuild vector index: {}", e))
        })?;

        info!("Indexed {} chunks", chunk_count);
        Ok(IndexReport {
            documents: documents.len(),
            chunks: chunk_count,
            embedding_dimension,
        })
    }

    /// Load every `.txt` file in `dir` and rebuild the index from them
    #[inline]
    pub async fn index_directory(&self, dir: &Path) -> Result<IndexReport> {
        let documents = load_text_documents(dir).await?;
        self.index_documents(&documents).await
    }
}
