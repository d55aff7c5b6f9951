// Database module
// Vector index abstraction with a LanceDB backend and an in-memory backend

pub mod lancedb;
pub mod memory;


use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;
use crate::embeddings::DocumentChunk;

pub use self::lancedb::VectorStore;
pub use memory::InMemoryIndex;

/// A chunk together with its embedding, as written to the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    /// Unique identifier for this record
    pub id: String,
    pub vector: Vec<f32>,
    pub chunk: DocumentChunk,
    /// Name of the model that produced `vector`
    pub embedding_model: String,
    /// RFC 3339 timestamp of the rebuild that wrote this record
    pub indexed_at: String,
}

impl IndexedRecord {
    #[inline]
    pub fn new(chunk: DocumentChunk, vector: Vec<f32>, embedding_model: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            chunk,
            embedding_model: embedding_model.to_string(),
            indexed_at: Utc::now().to_rfc3339(),
        }
    }
}

/// One nearest-neighbour hit
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunk: DocumentChunk,
    /// Squared L2 distance to the query; lower is closer
    pub score: f32,
    pub embedding_model: String,
}

/// Nearest-neighbour store for embedded chunks.
///
/// The index is the sole owner of its records. A rebuild replaces every
/// record from previous rebuilds.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replace the full contents of the index with `records`
    async fn clear_and_rebuild(&self, records: Vec<IndexedRecord>) -> Result<()>;

    /// Return up to `k` records closest to `vector`, best first.
    ///
    /// An index without records yields an empty list.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievalResult>>;

    async fn count(&self) -> Result<u64>;
}

/// Squared euclidean distance, matching LanceDB's `l2` metric
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Sort results best first; NaN distances sink to the end
#[inline]
pub fn sort_best_first(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| a.score.total_cmp(&b.score));
}
