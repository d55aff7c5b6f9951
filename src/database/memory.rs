//! In-memory [`VectorIndex`] for tests and callers that bring their own persistence.
//!
//! Vector search is brute force over every stored record.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tracing::debug;

use super::{IndexedRecord, RetrievalResult, VectorIndex, sort_best_first, squared_l2};
use crate::{KbError, Result};

#[derive(Debug, Default)]
pub struct InMemoryIndex {
    records: RwLock<Vec<IndexedRecord>>,
}

impl InMemoryIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    #[inline]
    async fn clear_and_rebuild(&self, records: Vec<IndexedRecord>) -> Result<()> {
        if let Some(first) = records.first() {
            let dimension = first.vector.len();
            if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
                return Err(KbError::Database(format!(
                    "Record {} has {} dimensions, expected {}",
                    bad.id,
                    bad.vector.len(),
                    dimension
                )));
            }
        }

        debug!("Rebuilding in-memory index with {} records", records.len());
        let mut stored = self.records.write().unwrap_or_else(PoisonError::into_inner);
        *stored = records;
        Ok(())
    }

    #[inline]
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let stored = self.records.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(first) = stored.first() {
            if first.vector.len() != vector.len() {
                return Err(KbError::Database(format!(
                    "Query vector has {} dimensions but the index holds {}",
                    vector.len(),
                    first.vector.len()
                )));
            }
        }

        let mut results: Vec<RetrievalResult> = stored
            .iter()
            .map(|record| RetrievalResult {
                chunk: record.chunk.clone(),
                score: squared_l2(&record.vector, vector),
                embedding_model: record.embedding_model.clone(),
            })
            .collect();

        sort_best_first(&mut results);
        results.truncate(k);
        Ok(results)
    }

    #[inline]
    async fn count(&self) -> Result<u64> {
        let stored = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(stored.len() as u64)
    }
}
