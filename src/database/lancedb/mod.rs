// LanceDB vector database module
// Persists embedded chunks on disk and answers nearest-neighbour queries

pub mod vector_store;

pub use vector_store::VectorStore;

/// Column names of the chunk table
pub(crate) mod columns {
    pub const ID: &str = "id";
    pub const VECTOR: &str = "vector";
    pub const CONTENT: &str = "content";
    pub const SOURCE: &str = "source";
    pub const LINE_NUMBER: &str = "line_number";
    pub const EMBEDDING_MODEL: &str = "embedding_model";
    pub const INDEXED_AT: &str = "indexed_at";
    pub const DISTANCE: &str = "_distance";
}
