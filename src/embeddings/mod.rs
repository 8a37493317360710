// Embeddings module
// Chunking, the HTTP feature-extraction client and dimension normalization

pub mod chunking;
pub mod client;
pub mod embedder;

pub use chunking::{Chunk, ChunkingConfig, chunk_text};
pub use client::InferenceClient;
pub use embedder::{
    DEFAULT_EMBEDDING_DIMENSION, Embedder, Embedding, EmbeddingProvider, EmbeddingQuality,
    RawEmbedding,
};
