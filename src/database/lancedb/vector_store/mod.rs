
use super::columns;
use crate::config::Config;
use crate::database::{IndexedRecord, RetrievalResult, VectorIndex, sort_best_first};
use crate::embeddings::DocumentChunk;
use crate::{KbError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::table::{AddDataMode, Table};
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

const TABLE_NAME: &str = "chunks";

/// Vector index persisted on disk with LanceDB
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    db_path: PathBuf,
}

impl VectorStore {
    /// Open the vector index at the location named by the configuration
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        Self::open(&config.vector_database_path()).await
    }

    /// Open (or create) a vector index directory
    ///
    /// # Arguments
    /// * `db_path` - Directory that holds the LanceDB dataset
    ///
    /// # Returns
    /// * `Result<Self>` - Connected store or a `KbError::Database`
    #[inline]
    pub async fn open(db_path: &Path) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            KbError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = db_path.to_string_lossy().to_string();

        let connection = lancedb::connect(&uri).execute().await.map_err(|e| {
            error!("Failed to connect to LanceDB: {}", e);
            KbError::Database(format!("Failed to connect to LanceDB: {}", e))
        })?;

        info!("Vector store opened at {}", db_path.display());
        Ok(Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            db_path: db_path.to_path_buf(),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn open_table_if_exists(&self) -> Result<Option<Table>> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| KbError::Database(format!("Failed to list tables: {}", e)))?;

        if !table_names.contains(&self.table_name) {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| KbError::Database(format!("Failed to open table: {}", e)))?;

        Ok(Some(table))
    }

    /// Detect vector dimension from the table schema
    async fn vector_dimension(table: &Table) -> Result<usize> {
        let schema = table
            .schema()
            .await
            .map_err(|e| KbError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == columns::VECTOR {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return usize::try_from(*size).map_err(|_| {
                        KbError::Database(format!("Invalid vector dimension: {}", size))
                    });
                }
            }
        }

        Err(KbError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(columns::ID, DataType::Utf8, false),
            Field::new(
                columns::VECTOR,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim,
                ),
                false,
            ),
            Field::new(columns::CONTENT, DataType::Utf8, false),
            Field::new(columns::SOURCE, DataType::Utf8, false),
            Field::new(columns::LINE_NUMBER, DataType::UInt32, false),
            Field::new(columns::EMBEDDING_MODEL, DataType::Utf8, false),
            Field::new(columns::INDEXED_AT, DataType::Utf8, false),
        ]))
    }

    /// Create a RecordBatch from indexed records that all share `vector_dim`
    fn create_record_batch(records: &[IndexedRecord], vector_dim: usize) -> Result<RecordBatch> {
        let dim = i32::try_from(vector_dim)
            .map_err(|_| KbError::Database(format!("Vector dimension too large: {}", vector_dim)))?;

        let mut flat_values = Vec::with_capacity(records.len() * vector_dim);
        for record in records {
            if record.vector.len() != vector_dim {
                return Err(KbError::Database(format!(
                    "Record {} has {} dimensions, expected {}",
                    record.id,
                    record.vector.len(),
                    vector_dim
                )));
            }
            flat_values.extend_from_slice(&record.vector);
        }

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, dim, Arc::new(Float32Array::from(flat_values)), None)
                .map_err(|e| {
                    KbError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.id.as_str()),
            )),
            Arc::new(vector_array),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.chunk.content.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.chunk.source.as_str()),
            )),
            Arc::new(UInt32Array::from_iter_values(
                records.iter().map(|r| r.chunk.line_number),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.embedding_model.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.indexed_at.as_str()),
            )),
        ];

        RecordBatch::try_new(Self::create_schema(dim), arrays)
            .map_err(|e| KbError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Parse search results from LanceDB stream into RetrievalResult structs
    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<RetrievalResult>> {
        let mut search_results = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| KbError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
        batch
            .column_by_name(name)
            .ok_or_else(|| KbError::Database(format!("Missing {} column", name)))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| KbError::Database(format!("Invalid {} column type", name)))
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RetrievalResult>> {
        let contents = Self::string_column(batch, columns::CONTENT)?;
        let sources = Self::string_column(batch, columns::SOURCE)?;
        let models = Self::string_column(batch, columns::EMBEDDING_MODEL)?;
        let line_numbers = batch
            .column_by_name(columns::LINE_NUMBER)
            .ok_or_else(|| KbError::Database("Missing line_number column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| KbError::Database("Invalid line_number column type".to_string()))?;

        let distances = batch
            .column_by_name(columns::DISTANCE)
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let results = (0..batch.num_rows())
            .map(|row| RetrievalResult {
                chunk: DocumentChunk {
                    content: contents.value(row).to_string(),
                    source: sources.value(row).to_string(),
                    line_number: line_numbers.value(row),
                },
                score: distances
                    .filter(|d| !d.is_null(row))
                    .map_or(f32::MAX, |d| d.value(row)),
                embedding_model: models.value(row).to_string(),
            })
            .collect();

        Ok(results)
    }

    /// Drop the chunk table if it exists
    async fn drop_table_if_exists(&self) -> Result<()> {
        let table_names =
            self.connection.table_names().execute().await.map_err(|e| {
                KbError::Database(format!("Failed to list tables for drop: {}", e))
            })?;

        if table_names.contains(&self.table_name) {
            info!("Dropping existing chunk table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| KbError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }

    /// Validate database integrity
    ///
    /// # Returns
    /// * `Result<bool>` - True if the index can be read (an absent table counts as healthy)
    #[inline]
    pub async fn validate_integrity(&self) -> Result<bool> {
        debug!("Validating database integrity");

        let table = match self.open_table_if_exists().await {
            Ok(Some(table)) => table,
            Ok(None) => return Ok(true),
            Err(e) => {
                error!("Failed to open table during integrity check: {}", e);
                return Ok(false);
            }
        };

        match table.count_rows(None).await {
            Ok(count) => {
                debug!("Database integrity check passed, {} rows found", count);
                Ok(true)
            }
            Err(e) => {
                error!("Failed to count rows during integrity check: {}", e);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl VectorIndex for VectorStore {
    /// Replace every stored chunk in one commit.
    ///
    /// When the table already exists with the same dimension the data is
    /// overwritten as a new table version, so concurrent readers see either
    /// the previous set or the new one. A dimension change drops and
    /// recreates the table.
    #[inline]
    async fn clear_and_rebuild(&self, records: Vec<IndexedRecord>) -> Result<()> {
        let Some(first) = records.first() else {
            info!("Rebuilding with no records, clearing vector index");
            return self.drop_table_if_exists().await;
        };

        let vector_dim = first.vector.len();
        let record_batch = Self::create_record_batch(&records, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let existing = match self.open_table_if_exists().await? {
            Some(table) => Self::vector_dimension(&table)
                .await
                .ok()
                .map(|dim| (table, dim)),
            None => None,
        };

        match existing {
            Some((table, dim)) if dim == vector_dim => {
                debug!("Overwriting chunk table with {} records", records.len());
                table
                    .add(reader)
                    .mode(AddDataMode::Overwrite)
                    .execute()
                    .await
                    .map_err(|e| KbError::Database(format!("Failed to overwrite chunks: {}", e)))?;
            }
            _ => {
                info!(
                    "Creating chunk table with vector dimension: {}",
                    vector_dim
                );
                self.drop_table_if_exists().await?;
                self.connection
                    .create_table(&self.table_name, reader)
                    .execute()
                    .await
                    .map_err(|e| KbError::Database(format!("Failed to create table: {}", e)))?;
            }
        }

        info!("Stored {} embedded chunks", records.len());
        Ok(())
    }

    #[inline]
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        debug!("Searching for similar vectors with limit: {}", k);

        let Some(table) = self.open_table_if_exists().await? else {
            debug!("Chunk table does not exist yet");
            return Ok(Vec::new());
        };

        let row_count = table
            .count_rows(None)
            .await
            .map_err(|e| KbError::Database(format!("Failed to count rows: {}", e)))?;
        if row_count == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let stored_dim = Self::vector_dimension(&table).await?;
        if stored_dim != vector.len() {
            return Err(KbError::Database(format!(
                "Query vector has {} dimensions but the index holds {}",
                vector.len(),
                stored_dim
            )));
        }

        let results = table
            .vector_search(vector)
            .map_err(|e| KbError::Database(format!("Failed to create vector search: {}", e)))?
            .column(columns::VECTOR)
            .distance_type(DistanceType::L2)
            .limit(k)
            .execute()
            .await
            .map_err(|e| KbError::Database(format!("Failed to execute search: {}", e)))?;

        let mut results = Self::parse_search_results_stream(results).await?;
        sort_best_first(&mut results);
        results.truncate(k);
        Ok(results)
    }

    #[inline]
    async fn count(&self) -> Result<u64> {
        let Some(table) = self.open_table_if_exists().await? else {
            return Ok(0);
        };

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| KbError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}
