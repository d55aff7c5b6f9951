use thiserror::Error;

pub type Result<T> = std::result::Result<T, KbError>;

#[derive(Error, Debug)]
pub enum KbError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Indexing error: {0}")]
    Indexing(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod answer;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod indexer;
pub mod knowledge_base;
pub mod llm;
pub mod rate_limit;
pub mod retriever;
