use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocQaError>;

#[derive(Error, Debug)]
pub enum DocQaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod extract;
pub mod faq;
pub mod generation;
pub mod http;
pub mod indexer;
pub mod mcp;
pub mod retrieval;
