#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Dimension of the vector index the embeddings are written to
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;

/// Raw output of a feature-extraction provider before normalization
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawEmbedding {
    Flat(Vec<f32>),
    Nested(Vec<Vec<f32>>),
    Batch { embeddings: Vec<Vec<f32>> },
    Single { embedding: Vec<f32> },
}

impl RawEmbedding {
    /// Flatten provider output into one vector; nested output uses its first row
    #[inline]
    pub fn into_values(self) -> Vec<f32> {
        match self {
            Self::Flat(values) | Self::Single { embedding: values } => values,
            Self::Nested(rows) | Self::Batch { embeddings: rows } => {
                rows.into_iter().next().unwrap_or_default()
            }
        }
    }
}

/// Something that can turn text into an embedding vector of any length
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_raw(&self, text: &str) -> Result<RawEmbedding>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingQuality {
    /// Values came from the provider
    Provided,
    /// Provider failed; values are random filler
    Degraded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
    pub quality: EmbeddingQuality,
}

impl Embedding {
    #[inline]
    pub fn is_degraded(&self) -> bool {
        self.quality == EmbeddingQuality::Degraded
    }
}

/// Produces embeddings of exactly `dimension` values
///
/// Provider output is zero-padded or truncated to the index dimension. When the
/// provider fails or returns nothing usable the embedder never errors: it fills
/// the vector with random values in [-1, 1] and marks it [`EmbeddingQuality::Degraded`].
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
}

impl std::fmt::Debug for Embedder {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl Embedder {
    #[inline]
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimension: usize) -> Self {
        Self {
            provider,
            dimension,
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub async fn embed(&self, text: &str) -> Embedding {
        match self.provider.embed_raw(text).await {
            Ok(raw) => {
                let values = raw.into_values();
                if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
                    warn!("Embedding provider returned no usable values, using random embedding");
                    return self.random_embedding();
                }
                debug!(
                    "Normalizing embedding of length {} to {}",
                    values.len(),
                    self.dimension
                );
                Embedding {
                    values: normalize_dimension(values, self.dimension),
                    quality: EmbeddingQuality::Provided,
                }
            }
            Err(e) => {
                warn!("Embedding request failed, using random embedding: {:#}", e);
                self.random_embedding()
            }
        }
    }

    fn random_embedding(&self) -> Embedding {
        let mut rng = rand::thread_rng();
        let values = (0..self.dimension)
            .map(|_| rng.gen_range(-1.0..=1.0))
            .collect();
        Embedding {
            values,
            quality: EmbeddingQuality::Degraded,
        }
    }
}

/// Zero-pad or truncate a vector to exactly `dimension` values
#[inline]
pub fn normalize_dimension(mut values: Vec<f32>, dimension: usize) -> Vec<f32> {
    values.resize(dimension, 0.0);
    values
}
